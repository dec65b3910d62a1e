//! Error types for key, session and gateway operations.

use thiserror::Error;

/// Errors surfaced by [`crate::key::KeyManager`], [`crate::session::SessionManager`]
/// and [`crate::gateway::AuthGateway`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// No policy exists with the given id.
    #[error("policy not found: {0}")]
    PolicyNotFound(String),

    /// No key exists with the given id or hash.
    #[error("key not found")]
    KeyNotFound,

    /// A raw secret did not match the expected `prefix_scope_random` shape.
    #[error("invalid key format")]
    InvalidKeyFormat,

    /// A bearer token failed signature or expiry validation.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The underlying storage layer failed.
    #[error("storage error: {0}")]
    Storage(#[from] weave_storage::StorageError),

    /// JSON (de)serialization of a persisted record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for fallible auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
