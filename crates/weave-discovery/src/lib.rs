//! Dynamic capability discovery: probe external services, describe what
//! they can do, and promote the findings that clear kernel enforcement
//! into the operator catalog.
//!
//! ```
//! use std::sync::Arc;
//! use weave_discovery::{DiscoveryEngine, DiscoverySource, DiscoveryMethod};
//! use weave_kernel::{ActorContext, KernelEnforcer, seed_default_kernel_policy};
//! use weave_policy::{PolicyEngine, seed_default_policies, DEFAULT_MASTER_POLICY_ID};
//! use weave_core::PolicyId;
//!
//! # async fn run() {
//! let kernel_engine = PolicyEngine::new();
//! seed_default_kernel_policy(&kernel_engine).await;
//! let caller = PolicyEngine::new();
//! seed_default_policies(&caller).await;
//! let actor = ActorContext::new(PolicyId::from_raw(DEFAULT_MASTER_POLICY_ID));
//!
//! let engine = DiscoveryEngine::new(
//!     Arc::new(KernelEnforcer::new(kernel_engine)),
//!     actor,
//!     Arc::new(caller),
//! );
//! let source = DiscoverySource::new("demo", "https://example.com", DiscoveryMethod::Probe);
//! engine.register_source(source).await;
//! assert_eq!(engine.stats().sources, 1);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod engine;
mod error;
mod probers;
mod promotion;
mod types;

pub use engine::{DiscoveryEngine, DiscoveryStats};
pub use error::{DiscoveryError, DiscoveryResult};
pub use promotion::{DefaultPromotionHook, DiscoveryHook};
pub use types::{AuthConfig, Capability, CapabilityType, DiscoveryMethod, DiscoverySource};
