//! Two-tier storage for the weave control plane.
//!
//! - **Tier 1** ([`kv`]): a raw namespaced key/value contract (`KvStore`),
//!   with an in-memory implementation for tests and single-process runs and
//!   an embedded-engine-backed implementation (behind the `db` feature) for
//!   durability — a two-tier storage design (raw KV via an embedded engine,
//!   document storage via the same engine's richer query surface).
//! - **Tier 2** ([`db`], feature-gated): document storage for larger
//!   structured records (operator catalog, capability index) where a flat
//!   key/value shape would be awkward.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod kv;

#[cfg(feature = "db")]
pub mod db;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore};

#[cfg(feature = "db")]
pub use db::SurrealKvStore;
