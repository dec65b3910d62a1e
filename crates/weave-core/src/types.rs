//! Shared enums and value types: permissions, resources, operator kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A UTC timestamp, used consistently across every entity in the system.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The kind of resource a [`Permission`] grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// API keys themselves.
    Key,
    /// Policy documents.
    Policy,
    /// Registered operators.
    Operator,
    /// Raw HTTP endpoints (used for prefix-based allow/deny lists).
    Endpoint,
    /// System-level resources (e.g. `"kernel"`, `"brain"`, `"discovery"`).
    System,
    /// The reactive slot network.
    Network,
    /// The memory store.
    Memory,
    /// The discovery engine.
    Discovery,
    /// Unrecognized resource type; never constructed by this crate's own
    /// code, but accepted on deserialization so unknown values degrade
    /// gracefully instead of failing the whole document.
    #[serde(other)]
    Unknown,
}

/// Permission level, ordered from no access to full administrative control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// No access.
    None = 0,
    /// Read-only access.
    Read = 1,
    /// Create/update access.
    Write = 2,
    /// Permission to invoke/execute.
    Execute = 3,
    /// Administrative access (create/delete policies, manage keys).
    Admin = 4,
    /// Full control, including kernel-level bypass eligibility.
    Master = 5,
}

impl PermissionLevel {
    /// Map an HTTP verb to the permission level it conventionally requires.
    #[must_use]
    pub fn for_http_method(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => Self::Read,
            "POST" => Self::Execute,
            "PUT" | "PATCH" => Self::Write,
            "DELETE" => Self::Admin,
            _ => Self::Execute,
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
            Self::Admin => "admin",
            Self::Master => "master",
        };
        f.write_str(s)
    }
}

/// A single permission grant: a resource type, an optional specific resource
/// id (`None` meaning "all resources of this type"), and a level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    /// The resource type this permission applies to.
    pub resource_type: ResourceType,
    /// A specific resource id, or `None` for a wildcard grant.
    pub resource_id: Option<String>,
    /// The level granted.
    pub level: PermissionLevel,
}

impl Permission {
    /// Construct a wildcard permission (applies to every resource of this type).
    #[must_use]
    pub fn wildcard(resource_type: ResourceType, level: PermissionLevel) -> Self {
        Self {
            resource_type,
            resource_id: None,
            level,
        }
    }

    /// Construct a permission scoped to one specific resource.
    #[must_use]
    pub fn scoped(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        level: PermissionLevel,
    ) -> Self {
        Self {
            resource_type,
            resource_id: Some(resource_id.into()),
            level,
        }
    }

    /// Does this permission apply to the given resource (matching type and,
    /// if scoped, the specific id)?
    #[must_use]
    pub fn applies_to(&self, resource_type: ResourceType, resource_id: Option<&str>) -> bool {
        if self.resource_type != resource_type {
            return false;
        }
        match (&self.resource_id, resource_id) {
            (None, _) => true,
            (Some(want), Some(got)) => want == got,
            (Some(_), None) => false,
        }
    }
}

/// The scope assigned to an API key at issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    /// Unrestricted root scope.
    Master,
    /// Administrative scope.
    Admin,
    /// Ordinary user scope.
    User,
    /// Machine-to-machine service scope.
    Service,
    /// Read-only scope.
    Readonly,
    /// Custom scope; the attached policy carries the actual grants.
    Custom,
    /// Unrecognized scope, degrades gracefully on deserialization.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Master => "master",
            Self::Admin => "admin",
            Self::User => "user",
            Self::Service => "service",
            Self::Readonly => "readonly",
            Self::Custom => "custom",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Coarse behavioral classification of an operator, used by discovery's
/// lexical heuristics and surfaced to callers for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorType {
    /// Persists data.
    Store,
    /// Fetches data by key or id.
    Retrieve,
    /// Reshapes data without side effects.
    Transform,
    /// Narrows a collection down.
    Filter,
    /// Combines multiple inputs into one.
    Aggregate,
    /// General-purpose computation; the default fallback.
    Compute,
    /// Model inference (chat/completion style).
    Infer,
    /// Produces an embedding vector.
    Embed,
    /// Performs a search/query.
    Search,
    /// Runs a fixed sequence of other operators.
    Sequence,
    /// Runs other operators concurrently.
    Parallel,
    /// Retries a wrapped operator.
    Retry,
    /// Enforces a deadline around a wrapped operator.
    Timeout,
    /// Fan-out to many targets.
    Broadcast,
    /// Picks one of several targets.
    Route,
    /// Epidemic/gossip-style propagation.
    Gossip,
}

impl OperatorType {
    /// Classify an operator by cheap lexical inspection of its name/URL,
    /// falling back to [`OperatorType::Compute`] when nothing matches.
    #[must_use]
    pub fn classify_lexically(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if contains_any(&["search", "find", "query"]) {
            Self::Search
        } else if contains_any(&["embed"]) {
            Self::Embed
        } else if contains_any(&["chat", "complete", "infer", "generate"]) {
            Self::Infer
        } else if contains_any(&["store", "save", "create", "insert"]) {
            Self::Store
        } else if contains_any(&["get", "fetch", "retrieve", "read"]) {
            Self::Retrieve
        } else if contains_any(&["filter"]) {
            Self::Filter
        } else if contains_any(&["aggregate", "sum", "count"]) {
            Self::Aggregate
        } else {
            Self::Compute
        }
    }
}
