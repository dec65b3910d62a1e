//! The kernel enforcer: three synchronous-from-the-caller entry points.

use std::panic::AssertUnwindSafe;

use weave_core::{PermissionLevel, ResourceType};
use weave_policy::{AccessContext, Decision, PolicyEngine};

use crate::transport::is_transport_secure;
use crate::types::ActorContext;

/// The global, kernel-tier policy layer.
#[derive(Debug, Clone)]
pub struct KernelEnforcer {
    kernel_policies: PolicyEngine,
}

impl KernelEnforcer {
    /// Build an enforcer backed by a (already-seeded) kernel policy engine.
    #[must_use]
    pub fn new(kernel_policies: PolicyEngine) -> Self {
        Self { kernel_policies }
    }

    /// Enforce before invoking an operator.
    pub async fn enforce_operator_invoke(
        &self,
        operator_id: &str,
        endpoint: &str,
        method: &str,
        actor_ctx: &ActorContext,
        caller_policies: &PolicyEngine,
    ) -> Decision {
        self.enforce(
            Some((operator_id, endpoint, method)),
            ResourceType::System,
            "operator_invoke",
            actor_ctx,
            caller_policies,
        )
        .await
    }

    /// Enforce before registering a discovered capability as usable.
    pub async fn enforce_discovery_register(
        &self,
        capability_type: &str,
        endpoint: &str,
        method: &str,
        actor_ctx: &ActorContext,
        caller_policies: &PolicyEngine,
    ) -> Decision {
        self.enforce(
            Some((capability_type, endpoint, method)),
            ResourceType::Discovery,
            "discovery_register",
            actor_ctx,
            caller_policies,
        )
        .await
    }

    /// Enforce before storing a memory.
    pub async fn enforce_memory_store(
        &self,
        memory_type: &str,
        actor_ctx: &ActorContext,
        caller_policies: &PolicyEngine,
    ) -> Decision {
        self.enforce(
            None,
            ResourceType::Memory,
            memory_type,
            actor_ctx,
            caller_policies,
        )
        .await
    }

    async fn enforce(
        &self,
        endpoint_info: Option<(&str, &str, &str)>,
        resource_type: ResourceType,
        resource_id: &str,
        actor_ctx: &ActorContext,
        caller_policies: &PolicyEngine,
    ) -> Decision {
        // Fail-safe: any unexpected panic inside the check is treated as a
        // deny rather than propagated, matching the invariant that kernel
        // enforcement failures must never fail open.
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            weave_storage::block_on(self.enforce_inner(endpoint_info, resource_type, resource_id, actor_ctx, caller_policies))
        }));

        match outcome {
            Ok(decision) => decision,
            Err(_) => Decision::deny("kernel enforcement failed unexpectedly; denying"),
        }
    }

    async fn enforce_inner(
        &self,
        endpoint_info: Option<(&str, &str, &str)>,
        resource_type: ResourceType,
        resource_id: &str,
        actor_ctx: &ActorContext,
        caller_policies: &PolicyEngine,
    ) -> Decision {
        if let Some((_, endpoint, _)) = endpoint_info {
            if !is_transport_secure(endpoint) {
                return Decision::deny("Insecure transport: HTTPS required");
            }
        }

        if actor_ctx.kernel_bypass {
            let ctx = access_ctx(actor_ctx);
            let bypass_allowed = caller_policies
                .check_access(
                    &actor_ctx.caller_policy_id,
                    ResourceType::System,
                    Some("kernel"),
                    PermissionLevel::Master,
                    &ctx,
                )
                .await
                .allowed;
            if bypass_allowed {
                return Decision::allow("kernel bypass granted via MASTER on SYSTEM/kernel");
            }
        }

        let ctx = access_ctx(actor_ctx);
        for policy in self.kernel_policies.list_policies().await {
            if !policy.is_active {
                continue;
            }

            if let Some((op_or_cap_id, endpoint, method)) = endpoint_info {
                let op_decision = self
                    .kernel_policies
                    .check_operator_access(&policy.policy_id, op_or_cap_id, PermissionLevel::Execute, &ctx)
                    .await;
                if !op_decision.allowed {
                    return Decision::deny(format!(
                        "denied by kernel policy {}: {}",
                        policy.policy_id, op_decision.reason
                    ));
                }
                let endpoint_decision = self
                    .kernel_policies
                    .check_endpoint_access(&policy.policy_id, endpoint, method, &ctx)
                    .await;
                if !endpoint_decision.allowed {
                    return Decision::deny(format!(
                        "denied by kernel policy {}: {}",
                        policy.policy_id, endpoint_decision.reason
                    ));
                }
            } else {
                let decision = self
                    .kernel_policies
                    .check_access(
                        &policy.policy_id,
                        resource_type,
                        Some(resource_id),
                        PermissionLevel::Write,
                        &ctx,
                    )
                    .await;
                if !decision.allowed {
                    return Decision::deny(format!(
                        "denied by kernel policy {}: {}",
                        policy.policy_id, decision.reason
                    ));
                }
            }
        }

        Decision::allow("kernel policies permit the action")
    }
}

fn access_ctx(actor_ctx: &ActorContext) -> AccessContext {
    let mut ctx = AccessContext::new();
    if let Some(ip) = &actor_ctx.ip {
        ctx = ctx.with_ip(ip.clone());
    }
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::PolicyId;
    use weave_policy::seed_default_policies;

    async fn caller_engine_with_kernel_master() -> (PolicyEngine, PolicyId) {
        let engine = PolicyEngine::new();
        seed_default_policies(&engine).await;
        (engine, PolicyId::from_raw(weave_policy::DEFAULT_MASTER_POLICY_ID))
    }

    #[tokio::test]
    async fn insecure_transport_is_denied() {
        let kernel_engine = PolicyEngine::new();
        crate::defaults::seed_default_kernel_policy(&kernel_engine).await;
        let enforcer = KernelEnforcer::new(kernel_engine);
        let (caller, policy_id) = caller_engine_with_kernel_master().await;
        let actor = ActorContext::new(policy_id);

        let decision = enforcer
            .enforce_operator_invoke("op_1", "http://example.com/api", "GET", &actor, &caller)
            .await;
        assert!(!decision.allowed);
        assert!(decision.reason.to_lowercase().contains("insecure"));
    }

    #[tokio::test]
    async fn default_kernel_policy_allows_https() {
        let kernel_engine = PolicyEngine::new();
        crate::defaults::seed_default_kernel_policy(&kernel_engine).await;
        let enforcer = KernelEnforcer::new(kernel_engine);
        let (caller, policy_id) = caller_engine_with_kernel_master().await;
        let actor = ActorContext::new(policy_id);

        let decision = enforcer
            .enforce_operator_invoke("op_1", "https://example.com/api", "GET", &actor, &caller)
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn explicit_kernel_deny_list_blocks_matching_endpoint() {
        let kernel_engine = PolicyEngine::new();
        crate::defaults::seed_default_kernel_policy(&kernel_engine).await;
        let mut restrictive = weave_policy::Policy::new(PolicyId::from_raw("kpol_no_admin"), "no-admin");
        restrictive.denied_endpoints.push("/admin".to_owned());
        kernel_engine.create_policy(restrictive).await;
        let enforcer = KernelEnforcer::new(kernel_engine);
        let (caller, policy_id) = caller_engine_with_kernel_master().await;
        let actor = ActorContext::new(policy_id);

        let decision = enforcer
            .enforce_operator_invoke("op_1", "https://example.com/admin/x", "GET", &actor, &caller)
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn break_glass_requires_both_bypass_flag_and_master_grant() {
        let kernel_engine = PolicyEngine::new();
        let mut deny_all = weave_policy::Policy::new(PolicyId::from_raw("kpol_lockdown"), "lockdown");
        deny_all.denied_endpoints.push("/".to_owned());
        kernel_engine.create_policy(deny_all).await;
        let enforcer = KernelEnforcer::new(kernel_engine);

        let (caller, master_policy_id) = caller_engine_with_kernel_master().await;

        let bypassing_master = ActorContext::new(master_policy_id).with_kernel_bypass();
        let decision = enforcer
            .enforce_operator_invoke("op_1", "https://example.com/x", "GET", &bypassing_master, &caller)
            .await;
        assert!(decision.allowed);

        let user_engine = PolicyEngine::new();
        seed_default_policies(&user_engine).await;
        let bypassing_user =
            ActorContext::new(PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID)).with_kernel_bypass();
        let decision = enforcer
            .enforce_operator_invoke("op_1", "https://example.com/x", "GET", &bypassing_user, &user_engine)
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn memory_store_enforcement_uses_default_policy() {
        let kernel_engine = PolicyEngine::new();
        crate::defaults::seed_default_kernel_policy(&kernel_engine).await;
        let enforcer = KernelEnforcer::new(kernel_engine);
        let (caller, policy_id) = caller_engine_with_kernel_master().await;
        let actor = ActorContext::new(policy_id);

        let decision = enforcer.enforce_memory_store("observation", &actor, &caller).await;
        assert!(decision.allowed);
    }
}
