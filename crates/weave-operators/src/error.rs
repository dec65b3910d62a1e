//! Error types for operator registration, dispatch and persistence.

use thiserror::Error;

/// Errors surfaced by [`crate::registry::OperatorRegistry`].
#[derive(Debug, Error)]
pub enum OperatorError {
    /// No operator exists with the given id.
    #[error("operator not found: {0}")]
    NotFound(String),

    /// Dispatch did not complete within the caller-supplied timeout.
    #[error("Timeout")]
    Timeout,

    /// An MCP stdio dispatch was rejected before a process was spawned.
    #[error("MCP stdio rejected: {0}")]
    McpStdioRejected(String),

    /// The underlying HTTP client failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] reqwest::Error),

    /// The underlying storage layer failed.
    #[error("storage error: {0}")]
    Storage(#[from] weave_storage::StorageError),

    /// JSON (de)serialization of a persisted record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for fallible operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;
