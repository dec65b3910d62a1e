//! Bundles the pieces an invocation needs to pass kernel enforcement.

use weave_kernel::{ActorContext, KernelEnforcer};
use weave_policy::PolicyEngine;

/// Everything [`crate::registry::OperatorRegistry::invoke`] needs to run the
/// mandatory kernel enforcement step before performing any I/O. `invoke`
/// takes this by value, not as an `Option`, so enforcement can never be
/// silently skipped by a caller.
pub struct EnforcementContext<'a> {
    /// The process-wide kernel enforcer.
    pub kernel: &'a KernelEnforcer,
    /// The caller's identity and break-glass intent.
    pub actor: &'a ActorContext,
    /// The caller's own (non-kernel) policy engine, consulted for break-glass.
    pub caller_policies: &'a PolicyEngine,
}

impl<'a> EnforcementContext<'a> {
    /// Bundle the three pieces together.
    #[must_use]
    pub fn new(kernel: &'a KernelEnforcer, actor: &'a ActorContext, caller_policies: &'a PolicyEngine) -> Self {
        Self {
            kernel,
            actor,
            caller_policies,
        }
    }
}
