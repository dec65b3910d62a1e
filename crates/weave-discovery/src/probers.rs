//! Per-method probing: turn a [`DiscoverySource`] into a list of candidate
//! [`Capability`] records. None of these functions enforce policy or persist
//! anything; that happens one layer up in [`crate::engine`].

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use weave_core::CapabilityId;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::types::{Capability, CapabilityType, DiscoveryMethod, DiscoverySource};

const PROBE_TIMEOUT_SECS: u64 = 10;
const PROBE_CANDIDATE_PATHS: &[&str] = &["/health", "/api", "/v1", "/graphql", "/rpc"];

fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

fn headers_for(source: &DiscoverySource) -> reqwest::header::HeaderMap {
    let mut map = reqwest::header::HeaderMap::new();
    for (name, value) in source.auth.headers() {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(&value),
        ) {
            map.insert(name, value);
        }
    }
    map
}

fn capability_id(source: &DiscoverySource, endpoint: &str, method: &str) -> CapabilityId {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{endpoint}:{method}", source.source_id.as_str()));
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect();
    CapabilityId::from_raw(format!("cap_{hex}"))
}

/// Run discovery against `source`, returning every capability found. Does
/// not talk to the kernel or the operator catalog.
pub async fn discover(source: &DiscoverySource) -> DiscoveryResult<Vec<Capability>> {
    match source.discovery_method {
        DiscoveryMethod::OpenApi => discover_openapi(source).await,
        DiscoveryMethod::GraphQlIntrospect => discover_graphql(source).await,
        DiscoveryMethod::Probe => discover_probe(source).await,
        DiscoveryMethod::Manifest => discover_manifest(source).await,
        DiscoveryMethod::Mcp => discover_mcp(source).await,
        DiscoveryMethod::DnsSd | DiscoveryMethod::Announcement => Ok(Vec::new()),
    }
}

async fn discover_openapi(source: &DiscoverySource) -> DiscoveryResult<Vec<Capability>> {
    let url = format!("{}{}", source.base_url, source.discovery_path);
    let response = client(PROBE_TIMEOUT_SECS)
        .get(&url)
        .headers(headers_for(source))
        .send()
        .await?;
    let document: Value = response.json().await?;
    let paths = document
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| DiscoveryError::MalformedDocument("missing `paths` object".to_owned()))?;

    let mut capabilities = Vec::new();
    for (path, operations) in paths {
        let Some(operations) = operations.as_object() else { continue };
        for (verb, operation) in operations {
            if !matches!(verb.as_str(), "get" | "post" | "put" | "patch" | "delete") {
                continue;
            }
            capabilities.push(parse_openapi_operation(source, path, verb, operation));
        }
    }
    Ok(capabilities)
}

fn parse_openapi_operation(source: &DiscoverySource, path: &str, verb: &str, operation: &Value) -> Capability {
    let endpoint = format!("{}{path}", source.base_url);
    let method = verb.to_ascii_uppercase();
    let name = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("{verb}_{path}").replace(['/', '{', '}'], "_"));

    let mut capability = Capability::new(
        capability_id(source, &endpoint, &method),
        name,
        CapabilityType::RestApi,
        endpoint,
        method,
        DiscoveryMethod::OpenApi,
        source.source_id.as_str().to_owned(),
    );
    capability.description = operation
        .get("summary")
        .or_else(|| operation.get("description"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    if let Some(schema) = operation
        .pointer("/requestBody/content/application~1json/schema")
        .cloned()
    {
        capability.input_schema.insert("body".to_owned(), schema);
    }
    if let Some(schema) = operation
        .pointer("/responses/200/content/application~1json/schema")
        .cloned()
    {
        capability.output_schema.insert("body".to_owned(), schema);
    }
    capability
}

async fn discover_graphql(source: &DiscoverySource) -> DiscoveryResult<Vec<Capability>> {
    let url = format!("{}{}", source.base_url, source.discovery_path);
    let introspection = serde_json::json!({
        "query": "query { __schema { queryType { fields { name } } mutationType { fields { name } } } }"
    });
    let response = client(PROBE_TIMEOUT_SECS)
        .post(&url)
        .headers(headers_for(source))
        .json(&introspection)
        .send()
        .await?;
    let document: Value = response.json().await?;

    let mut capabilities = Vec::new();
    let schema = document.pointer("/data/__schema");
    if let Some(fields) = schema.and_then(|schema| schema.pointer("/queryType/fields")).and_then(Value::as_array) {
        for field in fields {
            if let Some(name) = field.get("name").and_then(Value::as_str) {
                capabilities.push(graphql_capability(source, &url, name, "QUERY"));
            }
        }
    }
    if let Some(fields) = schema.and_then(|schema| schema.pointer("/mutationType/fields")).and_then(Value::as_array) {
        for field in fields {
            if let Some(name) = field.get("name").and_then(Value::as_str) {
                capabilities.push(graphql_capability(source, &url, name, "MUTATION"));
            }
        }
    }
    Ok(capabilities)
}

fn graphql_capability(source: &DiscoverySource, url: &str, field_name: &str, method: &str) -> Capability {
    Capability::new(
        capability_id(source, url, &format!("{method}:{field_name}")),
        field_name.to_owned(),
        CapabilityType::GraphQl,
        url.to_owned(),
        method.to_owned(),
        DiscoveryMethod::GraphQlIntrospect,
        source.source_id.as_str().to_owned(),
    )
}

async fn discover_probe(source: &DiscoverySource) -> DiscoveryResult<Vec<Capability>> {
    let http = client(PROBE_TIMEOUT_SECS);
    let mut capabilities = Vec::new();
    for path in PROBE_CANDIDATE_PATHS {
        let url = format!("{}{path}", source.base_url);
        let Ok(response) = http.get(&url).headers(headers_for(source)).send().await else {
            continue;
        };
        if response.status().as_u16() >= 400 {
            continue;
        }
        let mut capability = Capability::new(
            capability_id(source, &url, "GET"),
            (*path).trim_start_matches('/').to_owned(),
            CapabilityType::Function,
            url,
            "GET".to_owned(),
            DiscoveryMethod::Probe,
            source.source_id.as_str().to_owned(),
        );
        capability.description = format!("responding endpoint discovered by probing {path}");
        capabilities.push(capability);
    }
    Ok(capabilities)
}

async fn discover_manifest(source: &DiscoverySource) -> DiscoveryResult<Vec<Capability>> {
    let url = format!("{}{}", source.base_url, source.discovery_path);
    let response = client(PROBE_TIMEOUT_SECS)
        .get(&url)
        .headers(headers_for(source))
        .send()
        .await?;
    let document: Value = response.json().await?;
    let entries = document
        .get("capabilities")
        .and_then(Value::as_array)
        .ok_or_else(|| DiscoveryError::MalformedDocument("missing `capabilities` array".to_owned()))?;

    let mut capabilities = Vec::new();
    for entry in entries {
        let Some(name) = entry.get("name").and_then(Value::as_str) else { continue };
        let endpoint = entry
            .get("endpoint")
            .and_then(Value::as_str)
            .unwrap_or(&source.base_url)
            .to_owned();
        let method = entry.get("method").and_then(Value::as_str).unwrap_or("POST").to_owned();
        let mut capability = Capability::new(
            capability_id(source, &endpoint, &method),
            name.to_owned(),
            CapabilityType::Tool,
            endpoint,
            method,
            DiscoveryMethod::Manifest,
            source.source_id.as_str().to_owned(),
        );
        capability.description = entry.get("description").and_then(Value::as_str).unwrap_or_default().to_owned();
        if let Some(schema) = entry.get("input_schema").and_then(Value::as_object) {
            capability.input_schema = schema.clone().into_iter().collect::<HashMap<_, _>>();
        }
        capabilities.push(capability);
    }
    Ok(capabilities)
}

async fn discover_mcp(source: &DiscoverySource) -> DiscoveryResult<Vec<Capability>> {
    if !(source.base_url.starts_with("http://") || source.base_url.starts_with("https://")) {
        return Err(DiscoveryError::MalformedDocument(
            "stdio MCP transport not supported".to_owned(),
        ));
    }
    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/list",
        "params": {},
    });
    let response = client(PROBE_TIMEOUT_SECS)
        .post(&source.base_url)
        .headers(headers_for(source))
        .json(&request)
        .send()
        .await?;
    let document: Value = response.json().await?;
    let tools = document
        .pointer("/result/tools")
        .and_then(Value::as_array)
        .ok_or_else(|| DiscoveryError::MalformedDocument("missing `result.tools` array".to_owned()))?;

    let mut capabilities = Vec::new();
    for tool in tools {
        let Some(name) = tool.get("name").and_then(Value::as_str) else { continue };
        let mut capability = Capability::new(
            capability_id(source, &source.base_url, name),
            name.to_owned(),
            CapabilityType::Tool,
            source.base_url.clone(),
            "MCP".to_owned(),
            DiscoveryMethod::Mcp,
            source.source_id.as_str().to_owned(),
        );
        capability.description = tool.get("description").and_then(Value::as_str).unwrap_or_default().to_owned();
        if let Some(schema) = tool.get("inputSchema").and_then(Value::as_object) {
            capability.input_schema = schema.clone().into_iter().collect::<HashMap<_, _>>();
        }
        capabilities.push(capability);
    }
    Ok(capabilities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_id_is_stable_for_the_same_source_and_endpoint() {
        let source = DiscoverySource::new("svc", "https://example.com", DiscoveryMethod::Probe);
        let a = capability_id(&source, "https://example.com/health", "GET");
        let b = capability_id(&source, "https://example.com/health", "GET");
        assert_eq!(a, b);
    }

    #[test]
    fn capability_id_differs_for_different_endpoints() {
        let source = DiscoverySource::new("svc", "https://example.com", DiscoveryMethod::Probe);
        let a = capability_id(&source, "https://example.com/health", "GET");
        let b = capability_id(&source, "https://example.com/api", "GET");
        assert_ne!(a, b);
    }

    #[test]
    fn parse_openapi_operation_extracts_schemas_and_name() {
        let source = DiscoverySource::new("svc", "https://example.com", DiscoveryMethod::OpenApi);
        let operation = serde_json::json!({
            "operationId": "searchDocs",
            "summary": "Search documents",
            "requestBody": {"content": {"application/json": {"schema": {"type": "object"}}}},
            "responses": {"200": {"content": {"application/json": {"schema": {"type": "array"}}}}},
        });
        let capability = parse_openapi_operation(&source, "/search", "post", &operation);
        assert_eq!(capability.name, "searchDocs");
        assert_eq!(capability.description, "Search documents");
        assert!(capability.input_schema.contains_key("body"));
        assert!(capability.output_schema.contains_key("body"));
    }
}
