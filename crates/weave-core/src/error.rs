//! Shared error types.

use thiserror::Error;

/// Errors that can occur while working with foundation types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A timestamp or id could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A value was outside its valid range.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The field that failed validation.
        field: String,
        /// Human-readable explanation.
        message: String,
    },
}

/// Result type for foundation operations.
pub type CoreResult<T> = Result<T, CoreError>;
