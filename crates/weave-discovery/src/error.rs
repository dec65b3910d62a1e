//! Error types for source registration, probing and capability promotion.

use thiserror::Error;

/// Errors surfaced by [`crate::engine::DiscoveryEngine`].
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No source exists with the given id.
    #[error("discovery source not found: {0}")]
    SourceNotFound(String),

    /// No capability exists with the given id.
    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    /// The underlying HTTP client failed.
    #[error("probe error: {0}")]
    Probe(#[from] reqwest::Error),

    /// The document returned by a source could not be parsed as expected.
    #[error("malformed discovery document: {0}")]
    MalformedDocument(String),

    /// Registering the promoted capability as an operator failed.
    #[error("promotion error: {0}")]
    Promotion(#[from] weave_operators::OperatorError),
}

/// Convenience alias for fallible discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
