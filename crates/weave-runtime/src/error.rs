//! Composition-root error types.

use thiserror::Error;

/// Errors that can occur while assembling or running the control plane.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(#[from] weave_config::ConfigError),

    /// Logging could not be initialized.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] weave_telemetry::TelemetryError),

    /// A subsystem's own persistence layer failed during startup.
    #[error(transparent)]
    Subsystem(#[from] anyhow::Error),
}

/// Convenience alias for fallible composition-root operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
