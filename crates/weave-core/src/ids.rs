//! Typed identifiers for entities flowing through the control plane.
//!
//! Every id is a thin wrapper over a `String` so that, for example, a
//! [`PolicyId`] can never be passed where an [`OperatorId`] is expected.
//! Most ids are either random (`uuid` v4) or content-derived (built by the
//! crate that owns the entity, e.g. `weave-crypto::ContentHash`).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[doc = concat!("Identifier for a ", stringify!($name), ".")]
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new random identifier with this entity's prefix.
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4().simple()))
            }

            /// Wrap an existing string as this id, unchanged.
            #[must_use]
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Does this id carry the entity's conventional prefix?
            #[must_use]
            pub fn has_conventional_prefix(&self) -> bool {
                self.0.starts_with(concat!($prefix, "_"))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }
    };
}

string_id!(PolicyId, "pol");
string_id!(KeyId, "key");
string_id!(SessionId, "sess");
string_id!(TokenId, "tok");
string_id!(OperatorId, "op");
string_id!(InvocationId, "inv");
string_id!(SlotId, "slot");
string_id!(SignalId, "sig");
string_id!(BindingId, "bind");
string_id!(CapabilityId, "cap");
string_id!(SourceId, "src");
string_id!(MemoryId, "mem");
string_id!(PatternId, "pat");
string_id!(ThoughtId, "th");
string_id!(GoalId, "goal");
