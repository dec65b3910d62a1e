//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path that was read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file or merged document could not be parsed.
    #[error("failed to parse config at {path}: {source}")]
    ParseError {
        /// Path (or a synthetic marker like `<env>`) being parsed.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The resolved configuration failed validation.
    #[error("invalid configuration for {field}: {message}")]
    ValidationError {
        /// The offending field.
        field: String,
        /// Human-readable explanation.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
