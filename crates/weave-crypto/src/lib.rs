//! Content hashing and secret generation for the weave control plane.
//!
//! This crate provides:
//! - [`ContentHash`], a sha-256 content address used for memory ids and
//!   operator ids
//! - Raw API-key secret generation and constant-time verification
//!
//! ```
//! use weave_crypto::ContentHash;
//! let a = ContentHash::hash(b"hello");
//! let b = ContentHash::hash(b"hello");
//! assert_eq!(a, b);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod hash;
mod secret;

pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use secret::{generate_raw_secret, hash_secret, verify_secret};
