//! Configuration validation rules.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, Environment};

/// Validate a resolved configuration.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if a production deployment is
/// missing a sufficiently long `JWT_SECRET`, or if any numeric setting is
/// zero where it must be positive.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.environment == Environment::Production {
        match &config.jwt_secret {
            None => {
                return Err(ConfigError::ValidationError {
                    field: "jwt_secret".to_owned(),
                    message: "JWT_SECRET is required in production".to_owned(),
                });
            },
            Some(secret) if secret.len() < 32 => {
                return Err(ConfigError::ValidationError {
                    field: "jwt_secret".to_owned(),
                    message: format!(
                        "JWT_SECRET must be at least 32 bytes, got {}",
                        secret.len()
                    ),
                });
            },
            Some(_) => {},
        }
    }

    if config.scheduler_tick_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "scheduler_tick_ms".to_owned(),
            message: "must be positive".to_owned(),
        });
    }
    if config.health_tick_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "health_tick_secs".to_owned(),
            message: "must be positive".to_owned(),
        });
    }
    if config.invocation_history_capacity == 0 {
        return Err(ConfigError::ValidationError {
            field: "invocation_history_capacity".to_owned(),
            message: "must be positive".to_owned(),
        });
    }

    Ok(())
}
