//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur with telemetry operations.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The subscriber was already installed for this process.
    #[error("global tracing subscriber already set: {0}")]
    AlreadyInitialized(String),

    /// The env-filter directive string was malformed.
    #[error("invalid log directive: {0}")]
    InvalidDirective(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
