//! Default policies seeded at startup.

use weave_core::{Permission, PermissionLevel, PolicyId, ResourceType};

use crate::engine::PolicyEngine;
use crate::types::Policy;

/// The unrestricted root policy.
pub const DEFAULT_MASTER_POLICY_ID: &str = "pol_master";
/// The administrative policy (everything but kernel-level SYSTEM grants).
pub const DEFAULT_ADMIN_POLICY_ID: &str = "pol_admin";
/// The ordinary end-user policy.
pub const DEFAULT_USER_POLICY_ID: &str = "pol_user";
/// The read-only policy.
pub const DEFAULT_READONLY_POLICY_ID: &str = "pol_readonly";

/// Ids that can never be deleted via [`PolicyEngine::delete_policy`].
pub(crate) const RESERVED_POLICY_IDS: &[&str] = &[
    DEFAULT_MASTER_POLICY_ID,
    DEFAULT_ADMIN_POLICY_ID,
    DEFAULT_USER_POLICY_ID,
    DEFAULT_READONLY_POLICY_ID,
];

/// Seed the four reserved default policies into `engine`. Idempotent: safe
/// to call on every process startup.
pub async fn seed_default_policies(engine: &PolicyEngine) {
    for policy in [master_policy(), admin_policy(), user_policy(), readonly_policy()] {
        engine.create_policy(policy).await;
    }
}

fn master_policy() -> Policy {
    let mut policy = Policy::new(PolicyId::from_raw(DEFAULT_MASTER_POLICY_ID), "master");
    policy.permissions = vec![
        Permission::wildcard(ResourceType::Key, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Policy, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Operator, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Endpoint, PermissionLevel::Master),
        Permission::wildcard(ResourceType::System, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Network, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Memory, PermissionLevel::Master),
        Permission::wildcard(ResourceType::Discovery, PermissionLevel::Master),
    ];
    policy.rate_limits.per_minute = 6_000;
    policy.rate_limits.per_hour = 100_000;
    policy.rate_limits.per_day = 1_000_000;
    policy
}

fn admin_policy() -> Policy {
    let mut policy = Policy::new(PolicyId::from_raw(DEFAULT_ADMIN_POLICY_ID), "admin");
    policy.permissions = vec![
        Permission::wildcard(ResourceType::Key, PermissionLevel::Admin),
        Permission::wildcard(ResourceType::Policy, PermissionLevel::Admin),
        Permission::wildcard(ResourceType::Operator, PermissionLevel::Admin),
        Permission::wildcard(ResourceType::Endpoint, PermissionLevel::Admin),
        Permission::wildcard(ResourceType::Network, PermissionLevel::Admin),
        Permission::wildcard(ResourceType::Memory, PermissionLevel::Admin),
        Permission::wildcard(ResourceType::Discovery, PermissionLevel::Admin),
    ];
    policy
}

fn user_policy() -> Policy {
    let mut policy = Policy::new(PolicyId::from_raw(DEFAULT_USER_POLICY_ID), "user");
    policy.permissions = vec![
        Permission::wildcard(ResourceType::Operator, PermissionLevel::Execute),
        Permission::wildcard(ResourceType::Endpoint, PermissionLevel::Execute),
        Permission::wildcard(ResourceType::Network, PermissionLevel::Execute),
        Permission::wildcard(ResourceType::Memory, PermissionLevel::Write),
        Permission::wildcard(ResourceType::Discovery, PermissionLevel::Read),
    ];
    policy
}

fn readonly_policy() -> Policy {
    let mut policy = Policy::new(PolicyId::from_raw(DEFAULT_READONLY_POLICY_ID), "readonly");
    policy.permissions = vec![
        Permission::wildcard(ResourceType::Operator, PermissionLevel::Read),
        Permission::wildcard(ResourceType::Endpoint, PermissionLevel::Read),
        Permission::wildcard(ResourceType::Memory, PermissionLevel::Read),
        Permission::wildcard(ResourceType::Discovery, PermissionLevel::Read),
    ];
    policy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let engine = PolicyEngine::new();
        seed_default_policies(&engine).await;
        seed_default_policies(&engine).await;
        assert_eq!(engine.list_policies().await.len(), 4);
    }

    #[tokio::test]
    async fn master_grants_master_everywhere() {
        let engine = PolicyEngine::new();
        seed_default_policies(&engine).await;
        let ctx = crate::types::AccessContext::new();
        let decision = engine
            .check_access(
                &PolicyId::from_raw(DEFAULT_MASTER_POLICY_ID),
                ResourceType::System,
                Some("kernel"),
                PermissionLevel::Master,
                &ctx,
            )
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn readonly_cannot_write() {
        let engine = PolicyEngine::new();
        seed_default_policies(&engine).await;
        let ctx = crate::types::AccessContext::new();
        let decision = engine
            .check_access(
                &PolicyId::from_raw(DEFAULT_READONLY_POLICY_ID),
                ResourceType::Memory,
                None,
                PermissionLevel::Write,
                &ctx,
            )
            .await;
        assert!(!decision.allowed);
    }
}
