//! Content-addressed memory: store, recall, decay, linking, compression
//! and pattern matching for the reactive agent runtime.
//!
//! ```
//! use weave_memory::MemoryStore;
//! use std::collections::HashSet;
//!
//! # async fn run() {
//! let store = MemoryStore::in_memory();
//! let memory = store
//!     .store(serde_json::json!("hello"), "general", 0.5, HashSet::new(), HashSet::new())
//!     .await
//!     .unwrap();
//! let recalled = store.recall(Some(&memory.memory_id), None, None, None, 1).await.unwrap();
//! assert_eq!(recalled.len(), 1);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod store;
mod types;

pub use error::{MemoryError, MemoryResult};
pub use store::{Embedder, MemoryStats, MemoryStore};
pub use types::{Memory, Pattern};
