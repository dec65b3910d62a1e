//! The reactive slot network: the substrate, not a controller.
//!
//! The network doesn't decide anything on its own — it is infrastructure
//! that lets a graph of [`ReactiveSlot`]s react to [`Signal`]s via
//! [`ReactiveBinding`]s, cooperatively scheduled on a 10ms tick with a
//! slower 10s health sweep. Any behavior that looks intelligent emerges
//! from how slots are connected and bound, not from logic in this crate.
//!
//! ```
//! use std::sync::Arc;
//! use weave_network::EmergentNetwork;
//! use weave_kernel::{ActorContext, KernelEnforcer, seed_default_kernel_policy};
//! use weave_operators::OperatorRegistry;
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
//! let network = EmergentNetwork::new(
//!     Arc::new(OperatorRegistry::in_memory()),
//!     Arc::new(KernelEnforcer::new(kernel_engine)),
//!     Arc::new(caller),
//!     actor,
//! );
//! let slot = network.create_slot("generic", Vec::new(), Default::default()).await;
//! assert_eq!(network.get_state().await.slots, 1);
//! let _ = slot;
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod network;
mod types;

pub use error::{NetworkError, NetworkResult};
pub use network::{EmergentNetwork, InvokeOutcome, NetworkState};
pub use types::{BindingAction, ReactiveBinding, ReactiveSlot, Signal, SignalType, SlotState, TriggerPattern};
