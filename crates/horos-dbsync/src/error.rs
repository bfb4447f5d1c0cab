use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbSyncError {
    #[error("filter spec rejected: {0}")]
    InvalidFilter(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("malformed wire frame: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),
}
