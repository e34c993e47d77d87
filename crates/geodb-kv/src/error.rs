use std::path::PathBuf;

/// Errors from key-value engine operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// The key is absent, deleted, or expired in the transaction's view.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Keys must be non-empty.
    #[error("empty key")]
    EmptyKey,

    /// A write was attempted in a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// Another transaction committed a write to the same key first.
    #[error("transaction conflict on key {0}")]
    Conflict(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the commit log.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured data directory cannot be used.
    #[error("invalid data directory: {0}")]
    InvalidDataDir(PathBuf),
}

/// Result alias for engine operations.
pub type KvResult<T> = Result<T, KvError>;
