//! Crypto error types.

use thiserror::Error;

/// Errors that can occur during hashing or decoding.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Base64 decoding failed.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    /// Decoded bytes were the wrong length for a 32-byte hash.
    #[error("expected 32 bytes, got {0}")]
    WrongLength(usize),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
