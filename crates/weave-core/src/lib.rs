//! Foundation types shared by every crate in the weave control plane.
//!
//! This crate provides:
//! - Typed identifiers for every entity in the system
//! - The permission/resource-type vocabulary used by the policy and kernel layers
//! - The operator type classification used by discovery and the registry
//! - Common error types

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod ids;
pub mod prelude;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use types::{KeyScope, OperatorType, Permission, PermissionLevel, ResourceType, Timestamp};
