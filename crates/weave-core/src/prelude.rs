//! Commonly used types for convenient import.
//!
//! ```
//! use weave_core::prelude::*;
//! let perm = Permission::wildcard(ResourceType::Operator, PermissionLevel::Execute);
//! assert_eq!(perm.level, PermissionLevel::Execute);
//! ```

pub use crate::error::{CoreError, CoreResult};
pub use crate::ids::{
    BindingId, CapabilityId, GoalId, InvocationId, KeyId, MemoryId, OperatorId, PatternId,
    PolicyId, SessionId, SignalId, SlotId, SourceId, ThoughtId, TokenId,
};
pub use crate::types::{
    KeyScope, OperatorType, Permission, PermissionLevel, ResourceType, Timestamp,
};
