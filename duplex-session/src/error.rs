use thiserror::Error;

/// Failure talking to the shared document store. Recoverable, never retried
/// automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Transaction on {path} failed: {reason}")]
    Transaction { path: String, reason: String },
    #[error("Malformed document at {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Failure inside the peer transport. User-visible, non-fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to set up peer connection: {0}")]
    Setup(String),
    #[error("Session description rejected: {0}")]
    Description(String),
    #[error("ICE candidate rejected: {0}")]
    Candidate(String),
    #[error("Transport is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Persistence unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a session reports on its notification stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Failed to encode message: {0}")]
    Encode(String),
    #[error("Session is closed")]
    Closed,
}
