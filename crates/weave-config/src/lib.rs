//! Layered configuration for the weave control plane.
//!
//! Precedence, from lowest to highest: embedded defaults → an optional TOML
//! file → environment variables — the three tiers this single-process
//! control plane needs. Layers are merged into a `toml::Value` tree,
//! deserialized once at the end, then validated.
//!
//! ```
//! use weave_config::Config;
//! let config = Config::load_from_env_only().unwrap();
//! assert_eq!(config.environment, weave_config::Environment::Development);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod loader;
mod types;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::{Config, Environment};
