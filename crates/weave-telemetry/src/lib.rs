//! Logging and tracing for the weave control plane.
//!
//! This crate provides:
//! - Configurable logging setup (plain or JSON) with an env-filter directive
//! - A [`RequestContext`] for correlating log lines across a single
//!   inbound request as it flows through several subsystems
//!
//! ```rust,no_run
//! use weave_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), weave_telemetry::TelemetryError> {
//! let config = LogConfig::new("info").with_format(LogFormat::Pretty);
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("operator_registry").with_operation("invoke");
//! let _guard = ctx.span().entered();
//! tracing::info!("invoking operator");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
