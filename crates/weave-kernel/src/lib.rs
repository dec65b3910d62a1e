//! The global, second-tier authorization layer.
//!
//! Every side-effecting operation — invoking an operator, registering a
//! discovered capability, storing a memory — passes the caller's
//! [`weave_policy::PolicyEngine`] check first, then [`KernelEnforcer`].
//! Kernel policies (`kpol_`-prefixed) are process-wide, not per-key, and
//! enforce guardrails an admin cannot accidentally grant away through an
//! ordinary policy: an insecure-transport invariant, and an explicit
//! deny/allow evaluation over every active kernel policy.
//!
//! The only way around the kernel layer is break-glass: a caller whose own
//! policy grants MASTER on `SYSTEM/"kernel"` and who explicitly sets
//! [`ActorContext::kernel_bypass`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod defaults;
mod enforcer;
mod transport;
mod types;

pub use defaults::{DEFAULT_KERNEL_POLICY_ID, seed_default_kernel_policy};
pub use enforcer::KernelEnforcer;
pub use types::ActorContext;
pub use weave_policy::Decision;
