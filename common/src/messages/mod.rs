pub mod chat_messages;
pub mod dispatch_messages;
pub mod session_messages;

// Reexport all together for `use common::messages::*`
pub use chat_messages::*;
pub use dispatch_messages::*;
pub use session_messages::*;
