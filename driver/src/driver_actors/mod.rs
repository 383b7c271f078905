pub mod chat_relay;
pub mod dispatcher;
pub mod session;
