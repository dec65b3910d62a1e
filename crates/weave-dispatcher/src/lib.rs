//! Wires the operator catalog, reactive slot network, memory store, and
//! discovery engine behind one `think(thought)` entry point.
//!
//! ```
//! # async fn run() {
//! use std::sync::Arc;
//! use weave_dispatcher::Dispatcher;
//! use weave_discovery::DiscoveryEngine;
//! use weave_kernel::{seed_default_kernel_policy, ActorContext, KernelEnforcer};
//! use weave_memory::MemoryStore;
//! use weave_network::EmergentNetwork;
//! use weave_operators::OperatorRegistry;
//! use weave_policy::{seed_default_policies, PolicyEngine, DEFAULT_MASTER_POLICY_ID};
//!
//! let kernel_engine = PolicyEngine::new();
//! seed_default_kernel_policy(&kernel_engine).await;
//! let caller_policies = PolicyEngine::new();
//! seed_default_policies(&caller_policies).await;
//! let actor = ActorContext::new(weave_core::PolicyId::from_raw(DEFAULT_MASTER_POLICY_ID));
//! let caller_policies = Arc::new(caller_policies);
//! let kernel = Arc::new(KernelEnforcer::new(kernel_engine));
//!
//! let operators = Arc::new(OperatorRegistry::in_memory());
//! let network = Arc::new(EmergentNetwork::new(
//!     Arc::clone(&operators),
//!     Arc::clone(&kernel),
//!     Arc::clone(&caller_policies),
//!     actor.clone(),
//! ));
//! let memory = Arc::new(MemoryStore::in_memory());
//! let discovery = Arc::new(DiscoveryEngine::new(Arc::clone(&kernel), actor.clone(), Arc::clone(&caller_policies)));
//!
//! let dispatcher = Dispatcher::new(operators, network, memory, discovery, kernel, actor, caller_policies);
//! dispatcher.initialize().await;
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![warn(unreachable_pub)]

mod dispatcher;
mod error;
mod types;

pub use dispatcher::{Dispatcher, DispatcherStats};
pub use error::{DispatcherError, DispatcherResult};
pub use types::{BrainState, Goal, Thought, ThoughtType};
