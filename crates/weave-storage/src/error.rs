//! Storage error types.

use thiserror::Error;

/// Errors that can occur while reading or writing storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key does not exist.
    #[error("not found: {namespace}/{key}")]
    NotFound {
        /// The namespace that was queried.
        namespace: String,
        /// The key that was queried.
        key: String,
    },

    /// An internal storage engine error.
    #[error("internal storage error: {0}")]
    Internal(String),

    /// Failed to establish or use the underlying connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// Failed to serialize or deserialize a stored value.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The key itself was malformed (e.g. empty, or containing a namespace
    /// separator).
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
