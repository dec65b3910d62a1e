//! Per-caller access control for the weave control plane.
//!
//! A [`Policy`] is the admin-configured document attached to an API key: a
//! set of permission grants, operator/endpoint allow and deny lists, rate
//! limits, and validity restrictions. [`PolicyEngine`] evaluates policies
//! deterministically and without I/O.
//!
//! This is the first of two authorization tiers; the second, global tier is
//! `weave-kernel`, which is evaluated after a policy passes here.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod defaults;
mod engine;
mod error;
mod types;

pub use defaults::{
    DEFAULT_ADMIN_POLICY_ID, DEFAULT_MASTER_POLICY_ID, DEFAULT_READONLY_POLICY_ID,
    DEFAULT_USER_POLICY_ID, seed_default_policies,
};
pub use engine::PolicyEngine;
pub use error::{PolicyError, PolicyResult};
pub use types::{AccessContext, Decision, Policy, RateLimits, Restrictions};
