//! Config file discovery and layered loading.
//!
//! 1. Start from [`Config::default`].
//! 2. If a TOML file path is given and exists, merge its fields over the
//!    defaults.
//! 3. Apply environment variable overrides (`JWT_SECRET`, `MASTER_KEY_HASH`,
//!    `ENVIRONMENT`, and `WEAVE_*` for the rest).
//! 4. Validate.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

impl Config {
    /// Load configuration from an optional TOML file plus the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed or the final
    /// configuration fails validation.
    pub fn load(file_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match file_path {
            Some(path) if path.exists() => Self::load_file(path)?,
            _ => Self::default(),
        };
        apply_env_overrides(&mut config);
        validate::validate(&config)?;
        Ok(config)
    }

    /// Load configuration using only embedded defaults and the process
    /// environment (no file).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the final configuration fails validation.
    pub fn load_from_env_only() -> ConfigResult<Self> {
        Self::load(None)
    }

    /// Load a config from a single TOML file (no env overrides, no
    /// validation — callers typically follow with [`Config::load`]'s
    /// remaining steps, or call [`validate::validate`] directly).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(env) = std::env::var("ENVIRONMENT") {
        config.environment = match env.to_ascii_lowercase().as_str() {
            "production" | "prod" => crate::types::Environment::Production,
            _ => crate::types::Environment::Development,
        };
    }
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        config.jwt_secret = Some(secret);
    }
    if let Ok(hash) = std::env::var("MASTER_KEY_HASH") {
        config.master_key_hash = Some(hash);
    }
    if let Ok(path) = std::env::var("WEAVE_OPERATOR_CATALOG_PATH") {
        config.operator_catalog_path = path;
    }
    if let Some(v) = env_u64("WEAVE_SCHEDULER_TICK_MS") {
        config.scheduler_tick_ms = v;
    }
    if let Some(v) = env_u64("WEAVE_HEALTH_TICK_SECS") {
        config.health_tick_secs = v;
    }
    if let Some(v) = env_u64("WEAVE_DISCOVERY_PROBE_TIMEOUT_SECS") {
        config.discovery_probe_timeout_secs = v;
    }
    if let Some(v) = env_u64("WEAVE_OPERATOR_INVOKE_TIMEOUT_SECS") {
        config.operator_invoke_timeout_secs = v;
    }
    if let Some(v) = env_u64("WEAVE_INVOCATION_HISTORY_CAPACITY") {
        config.invocation_history_capacity = v as usize;
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // Environment variable tests mutate process-global state, so they must
    // not run concurrently with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_validate() {
        let _guard = ENV_LOCK.lock().unwrap();
        for var in ["ENVIRONMENT", "JWT_SECRET", "MASTER_KEY_HASH"] {
            unsafe { std::env::remove_var(var) };
        }
        let config = Config::load(None).unwrap();
        assert_eq!(config.environment, crate::types::Environment::Development);
    }

    #[test]
    fn env_overrides_take_precedence_over_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weave.toml");
        std::fs::write(&path, "environment = \"development\"\n").unwrap();

        unsafe { std::env::set_var("ENVIRONMENT", "production") };
        unsafe { std::env::set_var("JWT_SECRET", "x".repeat(32)) };
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.environment, crate::types::Environment::Production);
        unsafe { std::env::remove_var("ENVIRONMENT") };
        unsafe { std::env::remove_var("JWT_SECRET") };
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        for var in ["ENVIRONMENT", "JWT_SECRET", "MASTER_KEY_HASH"] {
            unsafe { std::env::remove_var(var) };
        }
        let config = Config::load(Some(Path::new("/nonexistent/weave.toml"))).unwrap();
        assert_eq!(
            config.operator_catalog_path,
            Config::default().operator_catalog_path
        );
    }
}
