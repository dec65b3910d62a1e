//! API key lifecycle, sessions and the authentication gateway.
//!
//! Every external request is expected to pass through [`AuthGateway::authenticate`]
//! before reaching a subsystem. The gateway accepts either a raw API key
//! (verified against [`key::KeyManager`]) or a signed bearer token
//! ([`token::AuthToken`]), producing an [`AuthContext`] that downstream
//! subsystems use for policy checks via [`weave_policy::PolicyEngine`].
//!
//! ```
//! use weave_auth::{AuthGateway, KeyManager};
//! use weave_policy::PolicyEngine;
//!
//! # async fn run() {
//! let policies = PolicyEngine::new();
//! weave_policy::seed_default_policies(&policies).await;
//! let keys = KeyManager::in_memory(policies.clone());
//! let gateway = AuthGateway::new(keys, policies, b"at-least-32-bytes-of-signing-secret".to_vec());
//! let ctx = gateway.authenticate(None, None, None).await;
//! assert!(!ctx.authenticated);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod gateway;
mod key;
mod session;
mod token;

pub use error::{AuthError, AuthResult};
pub use gateway::{AuthContext, AuthGateway};
pub use key::{ApiKey, KeyManager, KeyStatus};
pub use session::{Session, SessionManager};
pub use token::{AuthToken, DEFAULT_TOKEN_TTL_SECS};
