//! Capabilities, discovery sources, and the vocabulary describing how a
//! capability was found.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_core::{CapabilityId, SourceId};

/// The coarse shape of a discoverable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityType {
    /// A conventional REST endpoint.
    RestApi,
    /// A GraphQL query or mutation field.
    GraphQl,
    /// A websocket stream.
    Websocket,
    /// A bare callable function.
    Function,
    /// A named tool (MCP or similar).
    Tool,
    /// A model inference endpoint.
    Model,
    /// A database connection.
    Database,
    /// An object/blob storage endpoint.
    Storage,
    /// A message queue.
    Queue,
    /// A data stream.
    Stream,
    /// Unrecognized; degrades gracefully on deserialization.
    #[serde(other)]
    Unknown,
}

/// How a capability was (or should be) discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Parse an OpenAPI/Swagger document.
    OpenApi,
    /// GraphQL schema introspection.
    GraphQlIntrospect,
    /// Probe a fixed set of candidate paths.
    Probe,
    /// Read a JSON manifest document.
    Manifest,
    /// DNS service discovery (reserved; not implemented).
    DnsSd,
    /// A pushed capability announcement (reserved; not implemented).
    Announcement,
    /// Model Context Protocol tool listing.
    Mcp,
}

/// How a [`DiscoverySource`] authenticates outbound discovery requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    #[default]
    None,
    /// An API key sent as a named header.
    ApiKey {
        /// Header name to send the key under (defaults to `X-API-Key`).
        header: String,
        /// The key value.
        key: String,
    },
    /// A bearer token sent via `Authorization`.
    Bearer {
        /// The token value.
        token: String,
    },
    /// HTTP basic authentication.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
}

impl AuthConfig {
    /// Build the headers this auth config contributes to an outbound
    /// request.
    #[must_use]
    pub fn headers(&self) -> HashMap<String, String> {
        match self {
            Self::None => HashMap::new(),
            Self::ApiKey { header, key } => HashMap::from([(header.clone(), key.clone())]),
            Self::Bearer { token } => HashMap::from([("Authorization".to_owned(), format!("Bearer {token}"))]),
            Self::Basic { username, password } => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
                HashMap::from([("Authorization".to_owned(), format!("Basic {encoded}"))])
            },
        }
    }
}

/// A registered source to run discovery against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySource {
    /// Unique identifier.
    pub source_id: SourceId,
    /// A human-readable label.
    pub name: String,
    /// The base URL (or, for MCP stdio sources, a `command arg1 arg2`
    /// string) this source is reached at.
    pub base_url: String,
    /// Which discovery method to use against this source.
    pub discovery_method: DiscoveryMethod,
    /// Authentication to attach to outbound discovery requests.
    pub auth: AuthConfig,
    /// Path appended to `base_url` for methods that read a document
    /// (OpenAPI spec, GraphQL endpoint, manifest file).
    pub discovery_path: String,
    /// How often, in seconds, this source should be re-probed (advisory;
    /// enforced by the caller, not this crate).
    pub refresh_interval_secs: u64,
    /// Last time discovery ran against this source.
    pub last_discovery: Option<DateTime<Utc>>,
    /// How many capabilities the last run found.
    pub capabilities_found: usize,
    /// Whether this source is currently eligible for discovery.
    pub is_active: bool,
    /// Whether the caller who registered this source held MASTER. Required
    /// before an MCP stdio operator backed by this source may be dispatched,
    /// since a stdio source spawns a child process on this host.
    pub registered_by_master: bool,
}

impl DiscoverySource {
    /// Build a new, active source with no discovery history yet.
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, discovery_method: DiscoveryMethod) -> Self {
        Self {
            source_id: SourceId::new(),
            name: name.into(),
            base_url: base_url.into(),
            discovery_method,
            auth: AuthConfig::None,
            discovery_path: String::new(),
            refresh_interval_secs: 3600,
            last_discovery: None,
            capabilities_found: 0,
            is_active: true,
            registered_by_master: false,
        }
    }
}

/// A discovered capability: something callable, found by probing or reading
/// a source's published description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Unique identifier, usually derived deterministically from source +
    /// endpoint so re-discovery converges onto the same record.
    pub capability_id: CapabilityId,
    /// The capability's name (tool name, operation id, or derived label).
    pub name: String,
    /// The coarse kind of capability this is.
    pub capability_type: CapabilityType,
    /// The endpoint to call. For MCP capabilities this is the source's
    /// base URL, not a per-tool address.
    pub endpoint: String,
    /// HTTP method, `"QUERY"`/`"MUTATION"` for GraphQL, or `"MCP"`.
    pub method: String,
    /// Input schema, if known.
    pub input_schema: HashMap<String, Value>,
    /// Output schema, if known.
    pub output_schema: HashMap<String, Value>,
    /// A human-readable description.
    pub description: String,
    /// Free-form tags, used by [`crate::engine::DiscoveryEngine::search_capabilities`].
    pub tags: HashSet<String>,
    /// When this capability was discovered.
    pub discovered_at: DateTime<Utc>,
    /// Which method found it.
    pub discovery_method: DiscoveryMethod,
    /// The id of the [`DiscoverySource`] that produced it.
    pub source: String,
    /// Last time [`crate::engine::DiscoveryEngine::health_check`] ran for this capability.
    pub last_health_check: Option<DateTime<Utc>>,
    /// Whether the last health check succeeded.
    pub is_healthy: bool,
    /// Observed response time of the last health check, in milliseconds.
    pub response_time_ms: f64,
    /// Total invocation attempts recorded against this capability.
    pub call_count: u64,
    /// Total successful invocations recorded.
    pub success_count: u64,
    /// Whether the [`DiscoverySource`] this was found on was registered by
    /// a MASTER-level caller. Stamped by the engine at discovery time so
    /// downstream consumers (operator promotion) don't need to re-look up
    /// the source.
    pub source_registered_by_master: bool,
}

impl Capability {
    /// Build a new, healthy-by-default capability with no usage yet.
    #[must_use]
    pub fn new(
        capability_id: CapabilityId,
        name: impl Into<String>,
        capability_type: CapabilityType,
        endpoint: impl Into<String>,
        method: impl Into<String>,
        discovery_method: DiscoveryMethod,
        source: impl Into<String>,
    ) -> Self {
        Self {
            capability_id,
            name: name.into(),
            capability_type,
            endpoint: endpoint.into(),
            method: method.into(),
            input_schema: HashMap::new(),
            output_schema: HashMap::new(),
            description: String::new(),
            tags: HashSet::new(),
            discovered_at: Utc::now(),
            discovery_method,
            source: source.into(),
            last_health_check: None,
            is_healthy: true,
            response_time_ms: 0.0,
            call_count: 0,
            success_count: 0,
            source_registered_by_master: false,
        }
    }

    /// Fraction of recorded invocations that succeeded; `1.0` when none
    /// have been recorded yet.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.call_count == 0 {
            1.0
        } else {
            self.success_count as f64 / self.call_count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_defaults_to_one_with_no_calls() {
        let cap = Capability::new(CapabilityId::new(), "x", CapabilityType::Tool, "https://x", "MCP", DiscoveryMethod::Mcp, "src_1");
        assert!((cap.success_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn success_rate_reflects_recorded_calls() {
        let mut cap = Capability::new(CapabilityId::new(), "x", CapabilityType::Tool, "https://x", "MCP", DiscoveryMethod::Mcp, "src_1");
        cap.call_count = 4;
        cap.success_count = 3;
        assert!((cap.success_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn auth_config_builds_expected_headers() {
        let bearer = AuthConfig::Bearer { token: "abc".to_owned() };
        assert_eq!(bearer.headers().get("Authorization"), Some(&"Bearer abc".to_owned()));

        let api_key = AuthConfig::ApiKey { header: "X-Key".to_owned(), key: "secret".to_owned() };
        assert_eq!(api_key.headers().get("X-Key"), Some(&"secret".to_owned()));

        let basic = AuthConfig::Basic { username: "u".to_owned(), password: "p".to_owned() };
        assert!(basic.headers().get("Authorization").unwrap().starts_with("Basic "));
    }
}
