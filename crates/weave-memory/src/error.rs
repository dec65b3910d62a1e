//! Error types for the memory store.

use thiserror::Error;

/// Errors surfaced by [`crate::store::MemoryStore`].
#[derive(Debug, Error)]
pub enum MemoryError {
    /// No memory exists with the given id.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// Content could not be canonicalized for id derivation.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying storage layer failed.
    #[error("storage error: {0}")]
    Storage(#[from] weave_storage::StorageError),

    /// A pattern's `$regex` trigger condition failed to compile.
    #[error("invalid pattern regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// The configured embedder failed.
    #[error("embedding error: {0}")]
    Embedding(String),
}

/// Convenience alias for fallible memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
