//! Composition root for the weave control plane.
//!
//! Every subsystem (policy engines, kernel enforcer, auth gateway,
//! operator catalog, reactive network, memory store, discovery engine,
//! dispatcher) is constructed exactly once by [`Runtime::build`] and handed
//! out as `Arc`-shared handles — there are no module-level singletons
//! anywhere in this workspace.
//!
//! ```
//! use weave_runtime::Runtime;
//! use weave_config::Config;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Runtime::build(Config::default()).await?;
//! runtime.start().await;
//! assert_eq!(runtime.network.get_state().await.slots, 3);
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![warn(unreachable_pub)]

mod error;
mod runtime;

pub use error::{RuntimeError, RuntimeResult};
pub use runtime::Runtime;
