//! The authentication gateway: the single entry point every request passes
//! through before reaching a subsystem.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use weave_core::{PermissionLevel, PolicyId, ResourceType};
use weave_policy::{AccessContext, PolicyEngine};

use crate::key::{ApiKey, KeyManager};
use crate::token::{AuthToken, DEFAULT_TOKEN_TTL_SECS};

/// The outcome of [`AuthGateway::authenticate`]: either an identified,
/// policy-bound caller, or a reason authentication failed.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Whether authentication succeeded.
    pub authenticated: bool,
    /// The resolved API key, if authentication went through a key or a
    /// token whose backing key still exists.
    pub key: Option<ApiKey>,
    /// The decoded bearer token, if authentication went through one.
    pub token: Option<AuthToken>,
    /// The policy subsequent checks should be evaluated against.
    pub policy_id: Option<PolicyId>,
    /// The owning principal.
    pub owner_id: Option<String>,
    /// Populated when `authenticated` is `false`.
    pub error: Option<String>,
    /// Caller IP, forwarded into policy restriction checks.
    pub ip_address: Option<String>,
}

impl AuthContext {
    fn failure(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct RateWindow {
    count: u64,
    start: chrono::DateTime<Utc>,
}

struct RateLimitState {
    minute: RateWindow,
    hour: RateWindow,
    day: RateWindow,
}

impl RateLimitState {
    fn new(now: chrono::DateTime<Utc>) -> Self {
        Self {
            minute: RateWindow { count: 0, start: now },
            hour: RateWindow { count: 0, start: now },
            day: RateWindow { count: 0, start: now },
        }
    }
}

/// All authenticated requests pass through here: key/token verification,
/// policy-backed access checks, and per-key rate limiting.
#[derive(Clone)]
pub struct AuthGateway {
    keys: KeyManager,
    policies: PolicyEngine,
    jwt_secret: Vec<u8>,
    rate_limits: std::sync::Arc<DashMap<String, RateLimitState>>,
}

impl AuthGateway {
    /// Build a gateway over `keys`/`policies`, signing tokens with `jwt_secret`.
    #[must_use]
    pub fn new(keys: KeyManager, policies: PolicyEngine, jwt_secret: Vec<u8>) -> Self {
        Self {
            keys,
            policies,
            jwt_secret,
            rate_limits: std::sync::Arc::new(DashMap::new()),
        }
    }

    /// Authenticate a request from an API key and/or bearer token. If both
    /// are present, the API key wins.
    pub async fn authenticate(
        &self,
        api_key: Option<&str>,
        bearer_token: Option<&str>,
        ip_address: Option<String>,
    ) -> AuthContext {
        if let Some(raw) = api_key {
            return self.authenticate_api_key(raw, ip_address).await;
        }

        if let Some(bearer) = bearer_token {
            return self.authenticate_bearer(bearer, ip_address).await;
        }

        AuthContext::failure("No authentication provided")
    }

    async fn authenticate_api_key(&self, raw: &str, ip_address: Option<String>) -> AuthContext {
        match self.keys.verify_key(raw).await {
            Ok(key) => {
                let _ = self.keys.record_usage(&key.key_id).await;
                AuthContext {
                    authenticated: true,
                    policy_id: Some(key.policy_id.clone()),
                    owner_id: Some(key.owner_id.clone()),
                    key: Some(key),
                    token: None,
                    error: None,
                    ip_address,
                }
            },
            Err(err) => AuthContext {
                ip_address,
                ..AuthContext::failure(err.to_string())
            },
        }
    }

    async fn authenticate_bearer(&self, bearer: &str, ip_address: Option<String>) -> AuthContext {
        let token = match AuthToken::decode(bearer, &self.jwt_secret) {
            Ok(Some(token)) => token,
            Ok(None) => {
                return AuthContext {
                    ip_address,
                    ..AuthContext::failure("Token expired")
                };
            },
            Err(_) => {
                return AuthContext {
                    ip_address,
                    ..AuthContext::failure("Invalid token")
                };
            },
        };

        let key = self.keys.get_key(&token.key_id).await.ok().flatten();

        AuthContext {
            authenticated: true,
            policy_id: Some(token.policy_id.clone()),
            owner_id: Some(token.owner_id.clone()),
            key,
            token: Some(token),
            error: None,
            ip_address,
        }
    }

    /// Mint a new bearer token from a still-valid raw API key.
    pub async fn create_token(&self, raw_api_key: &str) -> Option<AuthToken> {
        let key = self.keys.verify_key(raw_api_key).await.ok()?;
        Some(AuthToken::new(
            key.key_id,
            key.owner_id,
            key.policy_id,
            key.scope.to_string(),
            Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        ))
    }

    /// Refresh an existing (possibly expired) bearer token, provided its
    /// backing key is still valid.
    pub async fn refresh_token(&self, token_str: &str) -> Option<AuthToken> {
        let old = AuthToken::decode(token_str, &self.jwt_secret).ok().flatten()?;
        let key = self.keys.get_key(&old.key_id).await.ok().flatten()?;
        if !key.is_valid().0 {
            return None;
        }
        Some(AuthToken::new(
            key.key_id,
            key.owner_id,
            key.policy_id,
            key.scope.to_string(),
            Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        ))
    }

    /// Check whether `ctx` has `required_level` on `resource_type`/`resource_id`.
    pub async fn check_access(
        &self,
        ctx: &AuthContext,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        required_level: PermissionLevel,
    ) -> (bool, String) {
        if !ctx.authenticated {
            return (false, "Not authenticated".to_owned());
        }
        let Some(policy_id) = &ctx.policy_id else {
            return (false, "No policy assigned".to_owned());
        };

        let mut access_ctx = AccessContext::new();
        if let Some(ip) = &ctx.ip_address {
            access_ctx = access_ctx.with_ip(ip.clone());
        }

        let decision = self
            .policies
            .check_access(policy_id, resource_type, resource_id, required_level, &access_ctx)
            .await;
        (decision.allowed, decision.reason)
    }

    /// Boolean-only convenience wrapper over [`Self::check_access`].
    pub async fn authorize(
        &self,
        ctx: &AuthContext,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        required_level: PermissionLevel,
    ) -> bool {
        self.check_access(ctx, resource_type, resource_id, required_level).await.0
    }

    /// Check and advance the sliding-window rate-limit counters for `ctx`'s
    /// key. Unauthenticated contexts always pass (handled elsewhere).
    pub async fn check_rate_limit(&self, ctx: &AuthContext) -> (bool, String) {
        let Some(key) = &ctx.key else {
            return (true, "OK".to_owned());
        };
        let Some(policy_id) = &ctx.policy_id else {
            return (false, "Policy not found".to_owned());
        };
        let Some(policy) = self.policies.get_policy(policy_id).await else {
            return (false, "Policy not found".to_owned());
        };
        let limits = policy.rate_limits;
        let now = Utc::now();

        let mut state = self
            .rate_limits
            .entry(key.key_id.to_string())
            .or_insert_with(|| RateLimitState::new(now));

        if (now - state.minute.start).num_seconds() > 60 {
            state.minute = RateWindow { count: 0, start: now };
        }
        if (now - state.hour.start).num_seconds() > 3600 {
            state.hour = RateWindow { count: 0, start: now };
        }
        if (now - state.day.start).num_seconds() > 86400 {
            state.day = RateWindow { count: 0, start: now };
        }

        if state.minute.count >= u64::from(limits.per_minute) {
            return (false, "Rate limit exceeded (per minute)".to_owned());
        }
        if state.hour.count >= u64::from(limits.per_hour) {
            return (false, "Rate limit exceeded (per hour)".to_owned());
        }
        if state.day.count >= u64::from(limits.per_day) {
            return (false, "Rate limit exceeded (per day)".to_owned());
        }

        state.minute.count = state.minute.count.saturating_add(1);
        state.hour.count = state.hour.count.saturating_add(1);
        state.day.count = state.day.count.saturating_add(1);

        (true, "OK".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::KeyScope;

    async fn gateway() -> (AuthGateway, String) {
        let policies = PolicyEngine::new();
        weave_policy::seed_default_policies(&policies).await;
        let keys = KeyManager::in_memory(policies.clone());
        let (_key, raw) = keys
            .create_key(
                "alice",
                PolicyId::from_raw(weave_policy::DEFAULT_USER_POLICY_ID),
                KeyScope::User,
                None,
                None,
                "",
                "",
            )
            .await
            .unwrap();
        (AuthGateway::new(keys, policies, b"at-least-32-bytes-of-secret-here!!".to_vec()), raw)
    }

    #[tokio::test]
    async fn api_key_authentication_succeeds() {
        let (gateway, raw) = gateway().await;
        let ctx = gateway.authenticate(Some(&raw), None, None).await;
        assert!(ctx.authenticated);
        assert_eq!(ctx.owner_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn api_key_wins_over_bearer_when_both_present() {
        let (gateway, raw) = gateway().await;
        let ctx = gateway.authenticate(Some(&raw), Some("not-a-real-jwt"), None).await;
        assert!(ctx.authenticated);
        assert!(ctx.key.is_some());
    }

    #[tokio::test]
    async fn bearer_token_round_trips_through_gateway() {
        let (gateway, raw) = gateway().await;
        let token = gateway.create_token(&raw).await.unwrap();
        let encoded = token.encode(b"at-least-32-bytes-of-secret-here!!").unwrap();
        let ctx = gateway.authenticate(None, Some(&encoded), None).await;
        assert!(ctx.authenticated);
    }

    #[tokio::test]
    async fn no_credentials_fails_authentication() {
        let (gateway, _raw) = gateway().await;
        let ctx = gateway.authenticate(None, None, None).await;
        assert!(!ctx.authenticated);
        assert_eq!(ctx.error.as_deref(), Some("No authentication provided"));
    }

    #[tokio::test]
    async fn rate_limit_blocks_after_per_minute_threshold() {
        let policies = PolicyEngine::new();
        seed_restrictive_rate_limit(&policies).await;
        let keys = KeyManager::in_memory(policies.clone());
        let (_key, raw) = keys
            .create_key("alice", PolicyId::from_raw("pol_one_per_minute"), KeyScope::User, None, None, "", "")
            .await
            .unwrap();
        let gateway = AuthGateway::new(keys, policies, b"at-least-32-bytes-of-secret-here!!".to_vec());
        let ctx = gateway.authenticate(Some(&raw), None, None).await;

        let (first_ok, _) = gateway.check_rate_limit(&ctx).await;
        assert!(first_ok);
        let (second_ok, reason) = gateway.check_rate_limit(&ctx).await;
        assert!(!second_ok);
        assert!(reason.contains("minute"));
    }

    async fn seed_restrictive_rate_limit(policies: &PolicyEngine) {
        let mut policy = weave_policy::Policy::new(PolicyId::from_raw("pol_one_per_minute"), "one-per-minute");
        policy.rate_limits.per_minute = 1;
        policies.create_policy(policy).await;
    }
}
