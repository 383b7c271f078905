use thiserror::Error;

/// Errors produced by the durable session store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(String),
    #[error("store entry corrupt: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by session commands.
///
/// Precondition violations are deliberately NOT errors: those commands are
/// defensive no-ops. The only failures a caller can see are durability
/// failures, where the in-memory state already holds the optimistic update
/// but the persisted view is behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session state not persisted: {0}")]
    Store(#[from] StoreError),
    #[error("session state not serializable: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Encode(err.to_string())
    }
}
