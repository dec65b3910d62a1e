//! Error types for the dispatcher.

use thiserror::Error;

/// Errors surfaced by [`crate::dispatcher::Dispatcher`].
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// No goal exists with the given id.
    #[error("goal not found: {0}")]
    GoalNotFound(String),

    /// A downstream operator invocation failed.
    #[error("operator error: {0}")]
    Operator(#[from] weave_operators::OperatorError),

    /// A downstream memory operation failed.
    #[error("memory error: {0}")]
    Memory(#[from] weave_memory::MemoryError),
}

/// Convenience alias for fallible dispatcher operations.
pub type DispatcherResult<T> = Result<T, DispatcherError>;
