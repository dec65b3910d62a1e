//! Shared test fixtures for the weave control plane.
//!
//! Add as a dev-dependency and use in `#[cfg(test)]` modules across any
//! crate in this workspace:
//!
//! ```toml
//! [dev-dependencies]
//! weave-test.workspace = true
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;

pub use fixtures::*;
