//! Operator signatures and invocation records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_core::{InvocationId, OperatorId, OperatorType};

/// The behavioral signature of a discovered or hand-registered operator:
/// how to call it, and what it has done so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSignature {
    /// Stable identifier.
    pub operator_id: OperatorId,
    /// The logical operation this endpoint performs.
    pub operator_type: OperatorType,
    /// The endpoint this operator calls. For MCP operators this is the
    /// underlying `DiscoverySource`'s base URL.
    pub endpoint_url: String,
    /// HTTP method, or the literal `"MCP"` for an MCP-backed operator.
    pub method: String,
    /// Headers sent with every call, including provenance markers
    /// (`x-source`, `x-discovery-method`, `x-tool-name`) for promoted
    /// capabilities.
    pub headers: HashMap<String, String>,
    /// Starting point for request construction; `$param` tokens inside
    /// string values are substituted at invocation time.
    pub request_template: HashMap<String, Value>,
    /// Parameter names the caller must supply.
    pub required_params: Vec<String>,
    /// Parameter names the caller may supply.
    pub optional_params: Vec<String>,
    /// A lightweight inferred schema of the response shape.
    pub response_schema: HashMap<String, Value>,
    /// `name -> dotted.path` extractors applied to the response body.
    pub output_extractors: HashMap<String, String>,
    /// JSONPath-like keys that, if present in the body, are informative
    /// signals of success (not authoritative; HTTP status decides).
    pub success_indicators: Vec<String>,
    /// Exponential moving average of call latency, in milliseconds.
    pub avg_latency_ms: f64,
    /// Exponential moving average of the success rate, in `[0, 1]`.
    pub success_rate: f64,
    /// How structurally consistent successful responses have been.
    pub consistency_score: f64,
    /// Whether this operator's output can feed a subsequent operator's input.
    pub can_chain: bool,
    /// Whether repeated identical calls are safe to retry.
    pub idempotent: bool,
    /// Whether invoking this operator has external side effects.
    pub side_effects: bool,
    /// When this operator was first registered.
    pub discovered_at: DateTime<Utc>,
    /// Last successful-or-not invocation time.
    pub last_used: Option<DateTime<Utc>>,
    /// Total number of invocations recorded.
    pub invocation_count: u64,
    /// Whether the discovery source this operator was promoted from was
    /// registered by a MASTER-level caller. Required before an MCP stdio
    /// dispatch is attempted, since that path spawns a child process.
    /// Always `false` for hand-registered operators.
    pub source_registered_by_master: bool,
}

impl OperatorSignature {
    /// A minimal signature for `operator_id` calling `endpoint_url` via
    /// `method`, with everything else at its default.
    #[must_use]
    pub fn new(operator_id: OperatorId, operator_type: OperatorType, endpoint_url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            operator_id,
            operator_type,
            endpoint_url: endpoint_url.into(),
            method: method.into(),
            headers: HashMap::new(),
            request_template: HashMap::new(),
            required_params: Vec::new(),
            optional_params: Vec::new(),
            response_schema: HashMap::new(),
            output_extractors: HashMap::new(),
            success_indicators: Vec::new(),
            avg_latency_ms: 0.0,
            success_rate: 1.0,
            consistency_score: 1.0,
            can_chain: true,
            idempotent: false,
            side_effects: true,
            discovered_at: Utc::now(),
            last_used: None,
            invocation_count: 0,
            source_registered_by_master: false,
        }
    }
}

/// A single invocation of an operator, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorInvocation {
    /// Unique identifier for this invocation.
    pub invocation_id: InvocationId,
    /// The operator that was (attempted to be) invoked.
    pub operator_id: OperatorId,
    /// The raw inputs the caller supplied.
    pub inputs: HashMap<String, Value>,
    /// Extracted outputs, present only on success.
    pub outputs: Option<HashMap<String, Value>>,
    /// Whether the call succeeded.
    pub success: bool,
    /// Observed latency in milliseconds.
    pub latency_ms: f64,
    /// When the invocation was recorded.
    pub timestamp: DateTime<Utc>,
    /// Failure reason, present only when `success` is `false`.
    pub error: Option<String>,
}

impl OperatorInvocation {
    /// Build a failure record before any network I/O was attempted.
    #[must_use]
    pub fn failure(operator_id: OperatorId, inputs: HashMap<String, Value>, error: impl Into<String>) -> Self {
        Self {
            invocation_id: InvocationId::new(),
            operator_id,
            inputs,
            outputs: None,
            success: false,
            latency_ms: 0.0,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }
}
