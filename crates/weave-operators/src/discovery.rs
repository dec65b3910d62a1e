//! Behavioral probing: discover an operator's signature by exercising an
//! unknown endpoint with sample payloads and analyzing what comes back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};
use weave_core::{OperatorId, OperatorType};

use crate::error::OperatorResult;
use crate::registry::OperatorRegistry;
use crate::types::OperatorSignature;

const PROBE_TIMEOUT_SECS: u64 = 10;

struct ProbeResult {
    body: Value,
    latency_ms: f64,
    success: bool,
}

/// Probes unknown endpoints and, when a pattern emerges, registers the
/// result as a new [`OperatorSignature`].
pub struct OperatorDiscovery {
    registry: Arc<OperatorRegistry>,
    client: reqwest::Client,
}

impl OperatorDiscovery {
    /// Build a discoverer that registers findings into `registry`.
    #[must_use]
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self {
            registry,
            client: reqwest::Client::new(),
        }
    }

    /// Probe `url` with each of `test_payloads` (defaulting to a single
    /// empty payload) and, if at least one probe succeeds, register and
    /// return the inferred [`OperatorSignature`].
    ///
    /// # Errors
    ///
    /// Returns an error only if registering the discovered operator fails
    /// (e.g. a persistence write error); probe failures themselves are
    /// recorded as unsuccessful samples, not propagated.
    pub async fn discover(
        &self,
        url: &str,
        method: &str,
        test_payloads: &[HashMap<String, Value>],
        headers: HashMap<String, String>,
    ) -> OperatorResult<Option<OperatorSignature>> {
        let payloads: Vec<HashMap<String, Value>> = if test_payloads.is_empty() {
            vec![HashMap::new()]
        } else {
            test_payloads.to_vec()
        };

        let mut results = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            results.push(self.probe_once(url, method, payload, &headers).await);
        }

        let Some(operator) = analyze_behavior(url, method, &headers, &results) else {
            return Ok(None);
        };

        self.registry.register(operator.clone()).await?;
        Ok(Some(operator))
    }

    async fn probe_once(
        &self,
        url: &str,
        method: &str,
        payload: &HashMap<String, Value>,
        headers: &HashMap<String, String>,
    ) -> ProbeResult {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (key, value) in headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            ) {
                header_map.insert(name, value);
            }
        }

        let started = Instant::now();
        let timeout = Duration::from_secs(PROBE_TIMEOUT_SECS);

        let response = if method.eq_ignore_ascii_case("GET") {
            let query: Vec<(String, String)> = payload
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect();
            self.client.get(url).query(&query).headers(header_map).timeout(timeout).send().await
        } else {
            self.client.post(url).json(payload).headers(header_map).timeout(timeout).send().await
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match response {
            Ok(response) => {
                let success = response.status().is_success();
                let text = response.text().await.unwrap_or_default();
                let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
                ProbeResult { body, latency_ms, success }
            },
            Err(_) => ProbeResult {
                body: Value::Null,
                latency_ms,
                success: false,
            },
        }
    }
}

fn analyze_behavior(
    url: &str,
    method: &str,
    headers: &HashMap<String, String>,
    results: &[ProbeResult],
) -> Option<OperatorSignature> {
    let successful: Vec<&ProbeResult> = results.iter().filter(|r| r.success).collect();
    if successful.is_empty() {
        return None;
    }

    let first_body = &successful[0].body;
    let operator_type = infer_type(url, method);
    let avg_latency = successful.iter().map(|r| r.latency_ms).sum::<f64>() / successful.len() as f64;
    let success_rate = successful.len() as f64 / results.len() as f64;

    let operator_id = deterministic_operator_id(url, method);

    let mut signature = OperatorSignature::new(operator_id, operator_type, url, method);
    signature.headers = headers.clone();
    signature.response_schema = infer_schema(first_body);
    signature.output_extractors = find_output_paths(first_body);
    signature.success_indicators = find_success_indicators(&successful);
    signature.avg_latency_ms = avg_latency;
    signature.success_rate = success_rate;
    signature.consistency_score = calculate_consistency(&successful);

    Some(signature)
}

/// Derive a stable operator id from the endpoint identity, so re-discovering
/// the same `url`/`method` pair converges onto the same catalog entry.
fn deterministic_operator_id(url: &str, method: &str) -> OperatorId {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b":");
    hasher.update(method.as_bytes());
    let digest = hasher.finalize();
    OperatorId::from_raw(format!("op_{}", hex_prefix(&digest, 16)))
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    bytes.iter().take(len / 2).map(|b| format!("{b:02x}")).collect()
}

fn infer_type(url: &str, method: &str) -> OperatorType {
    let lower = url.to_ascii_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains_any(&["search", "query", "find"]) {
        OperatorType::Search
    } else if contains_any(&["embed", "vector", "encode"]) {
        OperatorType::Embed
    } else if contains_any(&["chat", "complete", "generate", "infer"]) {
        OperatorType::Infer
    } else if contains_any(&["store", "save", "put", "create"]) {
        OperatorType::Store
    } else if contains_any(&["get", "fetch", "retrieve", "read", "status"]) {
        OperatorType::Retrieve
    } else if contains_any(&["transform", "convert", "process"]) {
        OperatorType::Transform
    } else if contains_any(&["filter", "select", "where"]) {
        OperatorType::Filter
    } else if contains_any(&["aggregate", "sum", "count", "avg"]) {
        OperatorType::Aggregate
    } else if method.eq_ignore_ascii_case("GET") {
        OperatorType::Retrieve
    } else {
        OperatorType::Compute
    }
}

fn infer_schema(body: &Value) -> HashMap<String, Value> {
    match body {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), Value::String(json_type_name(v).to_owned()))).collect(),
        Value::Array(items) => {
            let mut schema = HashMap::new();
            schema.insert("type".to_owned(), Value::String("array".to_owned()));
            if let Some(first) = items.first() {
                schema.insert("items".to_owned(), Value::Object(infer_schema(first).into_iter().collect()));
            }
            schema
        },
        other => HashMap::from([("type".to_owned(), Value::String(json_type_name(other).to_owned()))]),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn find_success_indicators(results: &[&ProbeResult]) -> Vec<String> {
    const CANDIDATE_KEYS: [&str; 5] = ["success", "status", "ok", "data", "result"];
    let mut found = HashSet::new();
    for result in results {
        if let Value::Object(map) = &result.body {
            for key in CANDIDATE_KEYS {
                if map.contains_key(key) {
                    found.insert(format!("$.{key}"));
                }
            }
        }
    }
    found.into_iter().collect()
}

fn find_output_paths(body: &Value) -> HashMap<String, String> {
    let mut paths = HashMap::new();
    if let Value::Object(map) = body {
        for key in map.keys() {
            match key.as_str() {
                "data" | "result" | "output" | "response" | "content" => {
                    paths.insert("main".to_owned(), format!("$.{key}"));
                },
                "id" | "uuid" | "identifier" => {
                    paths.insert("id".to_owned(), format!("$.{key}"));
                },
                "message" | "text" => {
                    paths.insert("content".to_owned(), format!("$.{key}"));
                },
                _ => {},
            }
        }
    }
    paths
}

fn calculate_consistency(results: &[&ProbeResult]) -> f64 {
    if results.len() < 2 {
        return 1.0;
    }

    let schemas: Vec<HashSet<String>> = results
        .iter()
        .filter_map(|r| match &r.body {
            Value::Object(map) => Some(map.keys().cloned().collect()),
            _ => None,
        })
        .collect();

    if schemas.is_empty() {
        return 1.0;
    }

    let mut common = schemas[0].clone();
    let mut total = schemas[0].clone();
    for schema in &schemas[1..] {
        common = common.intersection(schema).cloned().collect();
        total = total.union(schema).cloned().collect();
    }

    if total.is_empty() {
        1.0
    } else {
        common.len() as f64 / total.len() as f64
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(body: Value, success: bool) -> ProbeResult {
        ProbeResult { body, latency_ms: 10.0, success }
    }

    #[test]
    fn infer_type_prefers_lexical_match_over_method_fallback() {
        assert_eq!(infer_type("https://api.example.com/search", "POST"), OperatorType::Search);
        assert_eq!(infer_type("https://api.example.com/widgets", "GET"), OperatorType::Retrieve);
        assert_eq!(infer_type("https://api.example.com/widgets", "POST"), OperatorType::Compute);
    }

    #[test]
    fn analyze_behavior_returns_none_when_every_probe_failed() {
        let results = vec![result(Value::Null, false)];
        assert!(analyze_behavior("https://x.test/y", "GET", &HashMap::new(), &results).is_none());
    }

    #[test]
    fn analyze_behavior_infers_schema_and_output_paths() {
        let body = serde_json::json!({"data": {"id": "abc"}, "status": "ok"});
        let results = vec![result(body, true)];
        let signature = analyze_behavior("https://api.example.com/fetch", "GET", &HashMap::new(), &results).unwrap();

        assert_eq!(signature.operator_type, OperatorType::Retrieve);
        assert_eq!(signature.output_extractors.get("main"), Some(&"$.data".to_owned()));
        assert!(signature.success_indicators.contains(&"$.status".to_owned()));
    }

    #[test]
    fn calculate_consistency_is_one_for_identical_schemas() {
        let a = result(serde_json::json!({"id": "1", "name": "a"}), true);
        let b = result(serde_json::json!({"id": "2", "name": "b"}), true);
        assert!((calculate_consistency(&[&a, &b]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn calculate_consistency_reflects_partial_schema_overlap() {
        let a = result(serde_json::json!({"id": "1", "name": "a"}), true);
        let b = result(serde_json::json!({"id": "2", "extra": "z"}), true);
        let score = calculate_consistency(&[&a, &b]);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn deterministic_operator_id_is_stable_for_the_same_endpoint() {
        let a = deterministic_operator_id("https://api.example.com/x", "GET");
        let b = deterministic_operator_id("https://api.example.com/x", "GET");
        let c = deterministic_operator_id("https://api.example.com/y", "GET");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
