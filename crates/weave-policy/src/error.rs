//! Policy error types.

use thiserror::Error;

/// Errors returned by policy CRUD operations. Deciding access itself never
/// errors — see [`crate::Decision`], which models denial as data.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// No policy exists with the given id.
    #[error("policy not found: {0}")]
    NotFound(String),

    /// Attempted to delete or overwrite one of the reserved default policies.
    #[error("policy {0} is a reserved default and cannot be deleted")]
    ReservedPolicy(String),

    /// A glob pattern in an allow/deny list failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it failed to compile.
        reason: String,
    },
}

/// Result type for policy CRUD operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
