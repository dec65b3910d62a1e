//! Subscriber configuration and setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, single-line-per-event, for local development.
    Pretty,
    /// Structured JSON, one object per line, for production log collection.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    default_level: String,
    format: LogFormat,
    extra_directives: Vec<String>,
}

impl LogConfig {
    /// Start from a base level (e.g. `"info"`, `"debug"`), applied to every
    /// target unless overridden by a more specific directive.
    #[must_use]
    pub fn new(default_level: impl Into<String>) -> Self {
        Self {
            default_level: default_level.into(),
            format: LogFormat::Pretty,
            extra_directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-target directive (e.g. `"weave_operators=trace"`), on top
    /// of the default level.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.extra_directives.push(directive.into());
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut spec = self.default_level.clone();
        for directive in &self.extra_directives {
            spec.push(',');
            spec.push_str(directive);
        }
        EnvFilter::try_new(&spec).map_err(|e| TelemetryError::InvalidDirective(e.to_string()))
    }
}

/// Install a global tracing subscriber built from `config`.
///
/// Honors the `RUST_LOG` environment variable as an override of the
/// configured filter, matching the convention most of the ecosystem's
/// tracing-based binaries follow.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] if the filter spec is
/// malformed, or [`TelemetryError::AlreadyInitialized`] if a global
/// subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = if let Ok(from_env) = std::env::var("RUST_LOG") {
        EnvFilter::try_new(from_env).map_err(|e| TelemetryError::InvalidDirective(e.to_string()))?
    } else {
        config.build_filter()?
    };

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init(),
    };

    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

/// Install a reasonable default subscriber (`info` level, pretty format),
/// honoring `RUST_LOG`/`WEAVE_LOG` if set.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    let level = std::env::var("WEAVE_LOG").unwrap_or_else(|_| "info".to_owned());
    setup_logging(&LogConfig::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_filter_from_default_and_directives() {
        let config = LogConfig::new("info").with_directive("weave_core=debug");
        assert!(config.build_filter().is_ok());
    }

    #[test]
    fn rejects_malformed_directive() {
        let config = LogConfig::new("info").with_directive("!!!not a directive!!!");
        assert!(config.build_filter().is_err());
    }
}
