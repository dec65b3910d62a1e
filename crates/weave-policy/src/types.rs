//! Policy document and supporting value types.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use weave_core::{Permission, PermissionLevel, PolicyId, ResourceType, Timestamp};

/// Per-window request caps. `0` means "unbounded".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimits {
    /// Requests allowed per rolling 60-second window.
    pub per_minute: u32,
    /// Requests allowed per rolling hour.
    pub per_hour: u32,
    /// Requests allowed per rolling day.
    pub per_day: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1_000,
            per_day: 10_000,
        }
    }
}

/// Time- and network-based restrictions layered on top of permission checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Restrictions {
    /// The policy is not valid before this time, if set.
    pub valid_from: Option<Timestamp>,
    /// The policy is not valid after this time, if set.
    pub valid_until: Option<Timestamp>,
    /// If non-empty, only these source IPs may use this policy.
    pub ip_allowlist: Vec<String>,
    /// Source IPs that are never allowed, checked before the allowlist.
    pub ip_denylist: Vec<String>,
}

/// The admin-configured access document attached to an API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// This policy's id. Kernel-tier policies use the `kpol_` prefix instead
    /// of the ordinary `pol_` prefix (see `weave-kernel`).
    pub policy_id: PolicyId,
    /// A short human-readable label.
    pub name: String,
    /// The permission grants this policy carries.
    pub permissions: Vec<Permission>,
    /// Operator ids explicitly allowed. Empty means "not restrictive" (falls
    /// through to the permission check).
    pub allowed_operators: HashSet<String>,
    /// Operator ids explicitly denied; always takes precedence.
    pub denied_operators: HashSet<String>,
    /// URL path prefixes explicitly allowed. Empty means "not restrictive".
    pub allowed_endpoints: Vec<String>,
    /// URL path prefixes explicitly denied; always takes precedence.
    pub denied_endpoints: Vec<String>,
    /// Request-rate caps.
    pub rate_limits: RateLimits,
    /// Validity window and IP restrictions.
    pub restrictions: Restrictions,
    /// Whether the policy is currently usable at all.
    pub is_active: bool,
}

impl Policy {
    /// Construct a new, active policy with no permissions and no
    /// restrictions, ready to have grants added.
    #[must_use]
    pub fn new(policy_id: PolicyId, name: impl Into<String>) -> Self {
        Self {
            policy_id,
            name: name.into(),
            permissions: Vec::new(),
            allowed_operators: HashSet::new(),
            denied_operators: HashSet::new(),
            allowed_endpoints: Vec::new(),
            denied_endpoints: Vec::new(),
            rate_limits: RateLimits::default(),
            restrictions: Restrictions::default(),
            is_active: true,
        }
    }

    /// Add a permission grant, builder-style.
    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// The maximum permission level granted for a resource, considering both
    /// wildcard and resource-specific grants.
    #[must_use]
    pub fn max_level_for(&self, resource_type: ResourceType, resource_id: Option<&str>) -> PermissionLevel {
        self.permissions
            .iter()
            .filter(|p| p.applies_to(resource_type, resource_id))
            .map(|p| p.level)
            .max()
            .unwrap_or(PermissionLevel::None)
    }
}

/// The caller-supplied facts a policy check is evaluated against: source IP,
/// and (for tests) an overridden "current time".
#[derive(Debug, Clone, Default)]
pub struct AccessContext {
    /// The caller's source IP address, if known.
    pub ip: Option<String>,
    /// Override for "now", so restriction-window tests are deterministic.
    /// `None` means use the real wall clock.
    pub now: Option<Timestamp>,
}

impl AccessContext {
    /// An empty context (no IP known, real wall clock).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a source IP.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Override "now", for deterministic restriction-window tests.
    #[must_use]
    pub fn with_now(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.now.unwrap_or_else(chrono::Utc::now)
    }
}

/// The outcome of a policy (or kernel) check: denial is data, never an
/// exception.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the action is allowed.
    pub allowed: bool,
    /// Why, for logging and for surfacing to the caller on denial.
    pub reason: String,
}

impl Decision {
    /// Build an allow decision.
    #[must_use]
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    /// Build a deny decision.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}
