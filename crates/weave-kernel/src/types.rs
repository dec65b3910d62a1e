//! The caller identity/state a kernel check is evaluated against.

use weave_core::PolicyId;

/// Everything the kernel enforcer needs to know about the caller making a
/// request, beyond the resource being acted on.
#[derive(Debug, Clone)]
pub struct ActorContext {
    /// The caller's own (non-kernel) policy id, used only for the
    /// break-glass MASTER-on-`SYSTEM/"kernel"` check.
    pub caller_policy_id: PolicyId,
    /// The caller's source IP, forwarded into the kernel policy's own
    /// restriction checks.
    pub ip: Option<String>,
    /// Explicit opt-in to bypass kernel policy evaluation entirely. Only
    /// takes effect if the caller's own policy also grants MASTER on
    /// `SYSTEM/"kernel"` — setting this alone grants nothing.
    pub kernel_bypass: bool,
}

impl ActorContext {
    /// Construct a context for a caller with no bypass requested.
    #[must_use]
    pub fn new(caller_policy_id: PolicyId) -> Self {
        Self {
            caller_policy_id,
            ip: None,
            kernel_bypass: false,
        }
    }

    /// Request break-glass bypass, builder-style. Still requires the
    /// caller's policy to grant MASTER on `SYSTEM/"kernel"` to take effect.
    #[must_use]
    pub fn with_kernel_bypass(mut self) -> Self {
        self.kernel_bypass = true;
        self
    }

    /// Attach a source IP.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }
}
