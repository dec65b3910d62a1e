//! Error types for the reactive slot network.

use thiserror::Error;

/// Errors surfaced by [`crate::network::EmergentNetwork`].
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No slot exists with the given id.
    #[error("slot not found: {0}")]
    SlotNotFound(String),

    /// The underlying operator invocation failed outright (not just an
    /// unsuccessful response — a transport or serialization error).
    #[error("operator invocation error: {0}")]
    Operator(#[from] weave_operators::OperatorError),
}

/// Convenience alias for fallible network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
