//! The deterministic policy store and access-check algorithm.

use std::collections::HashMap;
use std::sync::Arc;

use globset::Glob;
use tokio::sync::RwLock;
use weave_core::{PermissionLevel, PolicyId, ResourceType};

use crate::defaults::RESERVED_POLICY_IDS;
use crate::error::{PolicyError, PolicyResult};
use crate::types::{AccessContext, Decision, Policy};

/// Holds every registered policy and evaluates access checks against them.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    policies: Arc<RwLock<HashMap<PolicyId, Policy>>>,
}

impl PolicyEngine {
    /// Construct an engine with no policies registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new policy (or re-register one of the reserved defaults
    /// idempotently, which is a no-op if already present and unchanged).
    pub async fn create_policy(&self, policy: Policy) {
        self.policies.write().await.insert(policy.policy_id.clone(), policy);
    }

    /// Fetch a policy by id.
    pub async fn get_policy(&self, id: &PolicyId) -> Option<Policy> {
        self.policies.read().await.get(id).cloned()
    }

    /// List every registered policy.
    pub async fn list_policies(&self) -> Vec<Policy> {
        self.policies.read().await.values().cloned().collect()
    }

    /// Apply a patch function to an existing policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NotFound`] if `id` is not registered.
    pub async fn update_policy(
        &self,
        id: &PolicyId,
        patch: impl FnOnce(&mut Policy),
    ) -> PolicyResult<Policy> {
        let mut guard = self.policies.write().await;
        let policy = guard
            .get_mut(id)
            .ok_or_else(|| PolicyError::NotFound(id.to_string()))?;
        patch(policy);
        Ok(policy.clone())
    }

    /// Delete a policy. Reserved default policies can never be deleted.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ReservedPolicy`] for a default policy id, or
    /// [`PolicyError::NotFound`] if `id` is not registered.
    pub async fn delete_policy(&self, id: &PolicyId) -> PolicyResult<()> {
        if RESERVED_POLICY_IDS.contains(&id.as_str()) {
            return Err(PolicyError::ReservedPolicy(id.to_string()));
        }
        let mut guard = self.policies.write().await;
        guard
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PolicyError::NotFound(id.to_string()))
    }

    /// Step 1-2 of the access algorithm, shared by every check: load the
    /// policy and apply restrictions. Returns `Err(Decision)` to short
    /// circuit, `Ok(Policy)` to continue.
    async fn load_and_check_restrictions(
        &self,
        id: &PolicyId,
        ctx: &AccessContext,
    ) -> Result<Policy, Decision> {
        let policy = self
            .policies
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Decision::deny(format!("policy not found: {id}")))?;

        if !policy.is_active {
            return Err(Decision::deny("policy is not active"));
        }

        let now = ctx.now();
        if let Some(from) = policy.restrictions.valid_from {
            if now < from {
                return Err(Decision::deny("policy is not yet valid"));
            }
        }
        if let Some(until) = policy.restrictions.valid_until {
            if now > until {
                return Err(Decision::deny("policy has expired"));
            }
        }

        if let Some(ip) = &ctx.ip {
            if policy.restrictions.ip_denylist.iter().any(|d| d == ip) {
                return Err(Decision::deny(format!("ip {ip} is denylisted")));
            }
            if !policy.restrictions.ip_allowlist.is_empty()
                && !policy.restrictions.ip_allowlist.iter().any(|a| a == ip)
            {
                return Err(Decision::deny(format!("ip {ip} is not allowlisted")));
            }
        }

        Ok(policy)
    }

    /// General resource-level access check: steps 1, 2, 4, 5 of the
    /// documented algorithm (endpoint prefix matching is step 3 and lives in
    /// [`PolicyEngine::check_endpoint_access`]).
    pub async fn check_access(
        &self,
        id: &PolicyId,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        required_level: PermissionLevel,
        ctx: &AccessContext,
    ) -> Decision {
        let policy = match self.load_and_check_restrictions(id, ctx).await {
            Ok(p) => p,
            Err(decision) => return decision,
        };

        let granted = policy.max_level_for(resource_type, resource_id);
        if granted < required_level {
            return Decision::deny(format!(
                "requires {required_level}, policy grants {granted}"
            ));
        }
        Decision::allow(format!("granted {granted}"))
    }

    /// Check whether `operator_id` may be invoked under this policy: deny
    /// list wins, then allow list (if non-empty, the id must match),
    /// otherwise fall back to the OPERATOR resource-type permission check.
    pub async fn check_operator_access(
        &self,
        id: &PolicyId,
        operator_id: &str,
        required_level: PermissionLevel,
        ctx: &AccessContext,
    ) -> Decision {
        let policy = match self.load_and_check_restrictions(id, ctx).await {
            Ok(p) => p,
            Err(decision) => return decision,
        };

        if policy.denied_operators.contains(operator_id) {
            return Decision::deny(format!("operator {operator_id} is denied by policy"));
        }
        if !policy.allowed_operators.is_empty() && !policy.allowed_operators.contains(operator_id)
        {
            return Decision::deny(format!(
                "operator {operator_id} is not in the allowed-operator list"
            ));
        }

        let granted = policy.max_level_for(ResourceType::Operator, Some(operator_id));
        if granted < required_level {
            return Decision::deny(format!(
                "requires {required_level} on operator {operator_id}, policy grants {granted}"
            ));
        }
        Decision::allow(format!("granted {granted} on operator {operator_id}"))
    }

    /// Check whether `endpoint` may be reached with `method` under this
    /// policy: deny-prefix wins, then allow-prefix (if non-empty), then the
    /// ENDPOINT permission check at the level the HTTP method conventionally
    /// requires.
    pub async fn check_endpoint_access(
        &self,
        id: &PolicyId,
        endpoint: &str,
        method: &str,
        ctx: &AccessContext,
    ) -> Decision {
        let policy = match self.load_and_check_restrictions(id, ctx).await {
            Ok(p) => p,
            Err(decision) => return decision,
        };

        if matches_any_prefix(&policy.denied_endpoints, endpoint) {
            return Decision::deny(format!("endpoint {endpoint} matches a denied prefix"));
        }
        if !policy.allowed_endpoints.is_empty()
            && !matches_any_prefix(&policy.allowed_endpoints, endpoint)
        {
            return Decision::deny(format!(
                "endpoint {endpoint} does not match any allowed prefix"
            ));
        }

        let required_level = PermissionLevel::for_http_method(method);
        let granted = policy.max_level_for(ResourceType::Endpoint, None);
        if granted < required_level {
            return Decision::deny(format!(
                "requires {required_level} for {method} {endpoint}, policy grants {granted}"
            ));
        }
        Decision::allow(format!("granted {granted} for {method} {endpoint}"))
    }
}

/// Prefix-match a path against a list of glob patterns (or plain prefixes —
/// a pattern with no glob metacharacters matches as a literal prefix).
pub(crate) fn matches_any_prefix(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|pattern| {
        if path.starts_with(pattern.as_str()) {
            return true;
        }
        Glob::new(pattern)
            .ok()
            .is_some_and(|g| g.compile_matcher().is_match(path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::Permission;

    fn ctx() -> AccessContext {
        AccessContext::new()
    }

    #[tokio::test]
    async fn missing_policy_denies() {
        let engine = PolicyEngine::new();
        let decision = engine
            .check_access(&PolicyId::new(), ResourceType::Operator, None, PermissionLevel::Read, &ctx())
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn inactive_policy_denies() {
        let engine = PolicyEngine::new();
        let id = PolicyId::new();
        let mut policy = Policy::new(id.clone(), "t");
        policy.is_active = false;
        engine.create_policy(policy).await;
        let decision = engine
            .check_access(&id, ResourceType::Operator, None, PermissionLevel::Read, &ctx())
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn grants_at_or_above_required_level() {
        let engine = PolicyEngine::new();
        let id = PolicyId::new();
        let policy = Policy::new(id.clone(), "t")
            .with_permission(Permission::wildcard(ResourceType::Operator, PermissionLevel::Execute));
        engine.create_policy(policy).await;

        let decision = engine
            .check_access(&id, ResourceType::Operator, Some("op_1"), PermissionLevel::Execute, &ctx())
            .await;
        assert!(decision.allowed);

        let decision = engine
            .check_access(&id, ResourceType::Operator, Some("op_1"), PermissionLevel::Admin, &ctx())
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn denied_operator_wins_over_allowed_permission() {
        let engine = PolicyEngine::new();
        let id = PolicyId::new();
        let mut policy = Policy::new(id.clone(), "t")
            .with_permission(Permission::wildcard(ResourceType::Operator, PermissionLevel::Master));
        policy.denied_operators.insert("op_evil".to_owned());
        engine.create_policy(policy).await;

        let decision = engine
            .check_operator_access(&id, "op_evil", PermissionLevel::Read, &ctx())
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn nonempty_allowlist_excludes_unlisted_operators() {
        let engine = PolicyEngine::new();
        let id = PolicyId::new();
        let mut policy = Policy::new(id.clone(), "t")
            .with_permission(Permission::wildcard(ResourceType::Operator, PermissionLevel::Master));
        policy.allowed_operators.insert("op_good".to_owned());
        engine.create_policy(policy).await;

        assert!(
            engine
                .check_operator_access(&id, "op_good", PermissionLevel::Read, &ctx())
                .await
                .allowed
        );
        assert!(
            !engine
                .check_operator_access(&id, "op_other", PermissionLevel::Read, &ctx())
                .await
                .allowed
        );
    }

    #[tokio::test]
    async fn endpoint_deny_prefix_wins() {
        let engine = PolicyEngine::new();
        let id = PolicyId::new();
        let mut policy = Policy::new(id.clone(), "t")
            .with_permission(Permission::wildcard(ResourceType::Endpoint, PermissionLevel::Master));
        policy.denied_endpoints.push("/admin".to_owned());
        engine.create_policy(policy).await;

        let decision = engine
            .check_endpoint_access(&id, "/admin/users", "GET", &ctx())
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn ip_restrictions_are_enforced() {
        let engine = PolicyEngine::new();
        let id = PolicyId::new();
        let mut policy = Policy::new(id.clone(), "t");
        policy.restrictions.ip_allowlist.push("10.0.0.1".to_owned());
        engine.create_policy(policy).await;

        let good = AccessContext::new().with_ip("10.0.0.1");
        let bad = AccessContext::new().with_ip("10.0.0.2");

        assert!(
            engine
                .check_access(&id, ResourceType::Operator, None, PermissionLevel::None, &good)
                .await
                .allowed
        );
        assert!(
            !engine
                .check_access(&id, ResourceType::Operator, None, PermissionLevel::None, &bad)
                .await
                .allowed
        );
    }

    #[tokio::test]
    async fn validity_window_is_enforced() {
        let engine = PolicyEngine::new();
        let id = PolicyId::new();
        let mut policy = Policy::new(id.clone(), "t");
        policy.restrictions.valid_until = Some(chrono::Utc::now() - chrono::Duration::seconds(1));
        engine.create_policy(policy).await;

        let decision = engine
            .check_access(&id, ResourceType::Operator, None, PermissionLevel::None, &ctx())
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn delete_reserved_policy_is_rejected() {
        let engine = PolicyEngine::new();
        crate::defaults::seed_default_policies(&engine).await;
        let err = engine
            .delete_policy(&PolicyId::from_raw(crate::defaults::DEFAULT_MASTER_POLICY_ID))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::ReservedPolicy(_)));
    }
}
