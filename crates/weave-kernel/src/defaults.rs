//! The default kernel policy seeded at startup.

use weave_core::{Permission, PermissionLevel, PolicyId, ResourceType};
use weave_policy::{Policy, PolicyEngine};

/// The default kernel policy id. Grants MASTER everywhere, meaning the
/// kernel layer is operationally a deny-list until an admin registers
/// additional, more restrictive `kpol_` policies — an explicit, intentional
/// default rather than an oversight.
pub const DEFAULT_KERNEL_POLICY_ID: &str = "kpol_default";

/// Seed `kpol_default` into a kernel-tier policy engine. Idempotent.
pub async fn seed_default_kernel_policy(engine: &PolicyEngine) {
    let mut policy = Policy::new(PolicyId::from_raw(DEFAULT_KERNEL_POLICY_ID), "kernel-default");
    policy.permissions = vec![
        Permission::wildcard(ResourceType::Operator, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Endpoint, PermissionLevel::Master),
        Permission::wildcard(ResourceType::System, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Memory, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Discovery, PermissionLevel::Master),
    ];
    engine.create_policy(policy).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_kernel_policy_grants_master() {
        let engine = PolicyEngine::new();
        seed_default_kernel_policy(&engine).await;
        let policy = engine
            .get_policy(&PolicyId::from_raw(DEFAULT_KERNEL_POLICY_ID))
            .await
            .unwrap();
        assert_eq!(
            policy.max_level_for(ResourceType::Operator, Some("op_anything")),
            PermissionLevel::Master
        );
    }
}
