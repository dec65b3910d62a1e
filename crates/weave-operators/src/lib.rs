//! The operator registry: catalog, kernel-enforced invocation, behavioral
//! discovery by probing, and pipeline composition.
//!
//! An operator is anything callable by URL and method, hand-registered or
//! discovered. [`OperatorRegistry`] is the catalog and the only place an
//! operator is actually invoked; every invocation passes the mandatory
//! kernel enforcement step (`weave-kernel`) before any network I/O, builds
//! its request from the operator's template, dispatches it, classifies
//! success by HTTP status, extracts named outputs by dotted path, and
//! updates the operator's rolling latency/success statistics.
//!
//! ```
//! use weave_operators::{OperatorRegistry, OperatorSignature};
//! use weave_core::{OperatorId, OperatorType};
//!
//! # async fn run() {
//! let registry = OperatorRegistry::in_memory();
//! let operator = OperatorSignature::new(OperatorId::new(), OperatorType::Compute, "https://example.com", "GET");
//! let id = registry.register(operator).await.unwrap();
//! assert!(registry.get(&id).is_some());
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod dispatch;
mod discovery;
mod enforcement;
mod error;
mod pipeline;
mod registry;
mod types;

pub use discovery::OperatorDiscovery;
pub use enforcement::EnforcementContext;
pub use error::{OperatorError, OperatorResult};
pub use pipeline::{OperatorPipeline, PipelineOutcome, StepTransform};
pub use registry::{DEFAULT_INVOKE_TIMEOUT_SECS, OperatorRegistry};
pub use types::{OperatorInvocation, OperatorSignature};
