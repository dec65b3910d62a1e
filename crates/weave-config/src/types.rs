//! Configuration struct definitions.

use serde::{Deserialize, Serialize};

/// Deployment environment. Controls whether missing security-sensitive
/// settings (like `JWT_SECRET`) are fatal at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; missing secrets are generated ephemerally with a
    /// warning instead of failing startup.
    Development,
    /// Production; missing required secrets fail startup.
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

/// The resolved control-plane configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which environment this process is running as.
    pub environment: Environment,

    /// HMAC signing secret for auth tokens. Required (≥ 32 bytes) in
    /// production; optional (auto-generated) in development.
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,

    /// Hex-encoded sha-256 hash of a pre-seeded master key, for bootstrap
    /// environments that don't want to mint a fresh master key on first run.
    pub master_key_hash: Option<String>,

    /// Where the operator catalog is snapshotted after every mutation.
    pub operator_catalog_path: String,

    /// Reactive network scheduler tick interval, in milliseconds.
    pub scheduler_tick_ms: u64,

    /// Reactive network health-loop interval, in seconds.
    pub health_tick_secs: u64,

    /// HTTP timeout applied to discovery probes, in seconds.
    pub discovery_probe_timeout_secs: u64,

    /// Default per-operator invocation timeout, in seconds.
    pub operator_invoke_timeout_secs: u64,

    /// Maximum retained operator invocations per operator (ring buffer size).
    pub invocation_history_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            jwt_secret: None,
            master_key_hash: None,
            operator_catalog_path: "./data/operators.json".to_owned(),
            scheduler_tick_ms: 10,
            health_tick_secs: 10,
            discovery_probe_timeout_secs: 8,
            operator_invoke_timeout_secs: 30,
            invocation_history_capacity: 256,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("has_jwt_secret", &self.jwt_secret.is_some())
            .field("master_key_hash", &self.master_key_hash)
            .field("operator_catalog_path", &self.operator_catalog_path)
            .field("scheduler_tick_ms", &self.scheduler_tick_ms)
            .field("health_tick_secs", &self.health_tick_secs)
            .field(
                "discovery_probe_timeout_secs",
                &self.discovery_probe_timeout_secs,
            )
            .field(
                "operator_invoke_timeout_secs",
                &self.operator_invoke_timeout_secs,
            )
            .field(
                "invocation_history_capacity",
                &self.invocation_history_capacity,
            )
            .finish()
    }
}
