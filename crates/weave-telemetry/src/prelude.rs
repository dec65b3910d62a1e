//! Commonly used types for convenient import.
//!
//! ```rust,no_run
//! use weave_telemetry::prelude::*;
//!
//! # fn main() -> TelemetryResult<()> {
//! let config = LogConfig::new("debug").with_format(LogFormat::Pretty);
//! setup_logging(&config)?;
//! let ctx = RequestContext::new("my_component").with_operation("process_request");
//! let _guard = ctx.span().entered();
//! tracing::info!("processing request");
//! # Ok(())
//! # }
//! ```

pub use crate::{
    LogConfig, LogFormat, RequestContext, TelemetryError, TelemetryResult, setup_default_logging,
    setup_logging,
};
