//! Request templating, HTTP/MCP dispatch, and response extraction.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{OperatorError, OperatorResult};
use crate::types::OperatorSignature;

/// Shell metacharacters that could enable command injection through a
/// stdio MCP source's base URL.
const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '`', '\n', '\r', '$'];

/// Build the concrete request body from `operator`'s template and the
/// caller-supplied `inputs`.
///
/// For each `k -> v` pair: any string template value containing the literal
/// token `$k` has it substituted (stringified `v`); if `k` is not already a
/// template key, it is also assigned directly as `request[k] = v`.
#[must_use]
pub fn build_request(operator: &OperatorSignature, inputs: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut request = operator.request_template.clone();

    for (key, value) in inputs {
        let token = format!("${key}");
        let value_str = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        for slot in request.values_mut() {
            if let Value::String(s) = slot {
                if *s == token {
                    *slot = value.clone();
                } else if s.contains(&token) {
                    *s = s.replace(&token, &value_str);
                }
            }
        }

        request.entry(key.clone()).or_insert_with(|| value.clone());
    }

    request
}

/// Outcome of dispatching a request to an operator's backing endpoint.
pub struct DispatchOutcome {
    /// Whether the HTTP status (or MCP call) indicated success.
    pub success: bool,
    /// The raw response body, parsed as JSON when possible.
    pub body: Value,
}

/// Dispatch `request` to `operator`'s endpoint, bound by `timeout`.
///
/// # Errors
///
/// Returns [`OperatorError::Dispatch`] if the underlying HTTP call fails
/// outright (connection refused, timeout, TLS error, ...). A non-2xx
/// response is not an error here — it is reported via `DispatchOutcome::success`.
pub async fn dispatch(
    operator: &OperatorSignature,
    request: &HashMap<String, Value>,
    timeout: Duration,
) -> OperatorResult<DispatchOutcome> {
    match operator.method.to_uppercase().as_str() {
        "MCP" => dispatch_mcp(operator, request, timeout).await,
        "GET" => dispatch_get(operator, request, timeout).await,
        _ => dispatch_body(operator, request, timeout).await,
    }
}

fn client(headers: &HashMap<String, String>, timeout: Duration) -> OperatorResult<reqwest::Client> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        if key.starts_with("x-") {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(key.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            header_map.insert(name, value);
        }
    }
    Ok(reqwest::Client::builder().timeout(timeout).default_headers(header_map).build()?)
}

async fn dispatch_get(
    operator: &OperatorSignature,
    request: &HashMap<String, Value>,
    timeout: Duration,
) -> OperatorResult<DispatchOutcome> {
    let client = client(&operator.headers, timeout)?;
    let query: Vec<(String, String)> = request
        .iter()
        .map(|(k, v)| (k.clone(), value_to_query_string(v)))
        .collect();

    let response = client.get(&operator.endpoint_url).query(&query).send().await?;
    let success = response.status().is_success();
    let body = parse_body(response).await;
    Ok(DispatchOutcome { success, body })
}

async fn dispatch_body(
    operator: &OperatorSignature,
    request: &HashMap<String, Value>,
    timeout: Duration,
) -> OperatorResult<DispatchOutcome> {
    let client = client(&operator.headers, timeout)?;
    let response = client
        .request(
            operator.method.parse().unwrap_or(reqwest::Method::POST),
            &operator.endpoint_url,
        )
        .json(request)
        .send()
        .await?;
    let success = response.status().is_success();
    let body = parse_body(response).await;
    Ok(DispatchOutcome { success, body })
}

/// MCP dispatch over a minimal JSON-RPC `tools/call` exchange.
///
/// For an `http(s)://` endpoint, this implements the streamable-HTTP shape
/// of the protocol (a single request/response JSON body) rather than a full
/// session handshake with SSE framing. For any other endpoint the base URL
/// is treated as a stdio command line; see [`dispatch_mcp_stdio`].
async fn dispatch_mcp(
    operator: &OperatorSignature,
    request: &HashMap<String, Value>,
    timeout: Duration,
) -> OperatorResult<DispatchOutcome> {
    let tool_name = operator
        .headers
        .get("x-tool-name")
        .cloned()
        .unwrap_or_else(|| operator.operator_id.to_string());

    let rpc_request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {
            "name": tool_name,
            "arguments": request,
        },
    });

    if !operator.endpoint_url.starts_with("http://") && !operator.endpoint_url.starts_with("https://") {
        return dispatch_mcp_stdio(operator, &rpc_request).await;
    }

    let client = client(&operator.headers, timeout)?;
    let response = client.post(&operator.endpoint_url).json(&rpc_request).send().await?;
    let success = response.status().is_success();
    let body = parse_body(response).await;

    let tool_failed = body.get("error").is_some() || body.get("result").and_then(|r| r.get("isError")).and_then(Value::as_bool).unwrap_or(false);

    Ok(DispatchOutcome {
        success: success && !tool_failed,
        body: body.get("result").cloned().unwrap_or(body),
    })
}

/// Run an MCP tool over stdio: `operator.endpoint_url` is a validated,
/// shell-tokenized command line, launched as a child process with the
/// request written as a single JSON-RPC line to stdin and the last line of
/// stdout read back as the response.
///
/// Only dispatched when the backing discovery source was registered by a
/// MASTER-level caller, and only after the command line is checked for
/// shell metacharacters — this still launches a child process with
/// caller-influenced arguments, so both checks are mandatory, not
/// defense-in-depth.
async fn dispatch_mcp_stdio(operator: &OperatorSignature, rpc_request: &Value) -> OperatorResult<DispatchOutcome> {
    if !operator.source_registered_by_master {
        return Err(OperatorError::McpStdioRejected(
            "stdio MCP source was not registered by a MASTER-level caller".to_owned(),
        ));
    }

    if let Some(bad) = operator.endpoint_url.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(OperatorError::McpStdioRejected(format!(
            "command contains shell metacharacter {bad:?}"
        )));
    }

    let words = shlex::split(&operator.endpoint_url)
        .ok_or_else(|| OperatorError::McpStdioRejected("failed to tokenize stdio command".to_owned()))?;
    let Some((program, args)) = words.split_first() else {
        return Err(OperatorError::McpStdioRejected("stdio command is empty".to_owned()));
    };

    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null());
    for (key, value) in &operator.headers {
        if !key.starts_with("x-") {
            command.env(key, value);
        }
    }

    let mut child = command
        .spawn()
        .map_err(|error| OperatorError::McpStdioRejected(format!("failed to spawn stdio MCP process: {error}")))?;

    let mut payload = serde_json::to_vec(rpc_request)?;
    payload.push(b'\n');
    let mut stdin = child.stdin.take().expect("stdin was piped");
    stdin
        .write_all(&payload)
        .await
        .map_err(|error| OperatorError::McpStdioRejected(format!("failed to write to stdio MCP process: {error}")))?;
    drop(stdin);

    let output = child
        .wait_with_output()
        .await
        .map_err(|error| OperatorError::McpStdioRejected(format!("stdio MCP process failed: {error}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let body: Value = stdout
        .lines()
        .next_back()
        .and_then(|line| serde_json::from_str(line).ok())
        .unwrap_or_else(|| Value::String(stdout.into_owned()));

    let tool_failed = body.get("error").is_some() || body.get("result").and_then(|r| r.get("isError")).and_then(Value::as_bool).unwrap_or(false);

    Ok(DispatchOutcome {
        success: output.status.success() && !tool_failed,
        body: body.get("result").cloned().unwrap_or(body),
    })
}

async fn parse_body(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn value_to_query_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract named outputs from `body` using `operator.output_extractors`'
/// dotted paths. Numeric path segments index into arrays. A missing path
/// maps to `null`; `"raw"` always carries the unparsed body.
#[must_use]
pub fn extract_outputs(operator: &OperatorSignature, body: &Value) -> HashMap<String, Value> {
    let mut outputs = HashMap::new();
    outputs.insert("raw".to_owned(), body.clone());

    for (name, path) in &operator.output_extractors {
        let trimmed = path.trim_start_matches("$.");
        let mut current = body;
        let mut found = true;
        for part in trimmed.split('.') {
            if part.is_empty() {
                continue;
            }
            current = if let Ok(index) = part.parse::<usize>() {
                match current.get(index) {
                    Some(v) => v,
                    None => {
                        found = false;
                        break;
                    },
                }
            } else {
                match current.get(part) {
                    Some(v) => v,
                    None => {
                        found = false;
                        break;
                    },
                }
            };
        }
        outputs.insert(name.clone(), if found { current.clone() } else { Value::Null });
    }

    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::{OperatorId, OperatorType};

    fn op() -> OperatorSignature {
        OperatorSignature::new(OperatorId::new(), OperatorType::Compute, "https://example.com/api", "POST")
    }

    #[test]
    fn build_request_substitutes_template_placeholders() {
        let mut operator = op();
        operator.request_template.insert("query".to_owned(), Value::String("find $term please".to_owned()));

        let mut inputs = HashMap::new();
        inputs.insert("term".to_owned(), Value::String("widgets".to_owned()));

        let request = build_request(&operator, &inputs);
        assert_eq!(request.get("query"), Some(&Value::String("find widgets please".to_owned())));
    }

    #[test]
    fn build_request_adds_unmapped_inputs_directly() {
        let operator = op();
        let mut inputs = HashMap::new();
        inputs.insert("limit".to_owned(), Value::from(10));

        let request = build_request(&operator, &inputs);
        assert_eq!(request.get("limit"), Some(&Value::from(10)));
    }

    #[test]
    fn extract_outputs_walks_dotted_paths_with_numeric_indices() {
        let mut operator = op();
        operator.output_extractors.insert("first_id".to_owned(), "$.items.0.id".to_owned());
        operator.output_extractors.insert("missing".to_owned(), "$.nope".to_owned());

        let body = serde_json::json!({"items": [{"id": "abc"}]});
        let outputs = extract_outputs(&operator, &body);

        assert_eq!(outputs.get("first_id"), Some(&Value::String("abc".to_owned())));
        assert_eq!(outputs.get("missing"), Some(&Value::Null));
        assert_eq!(outputs.get("raw"), Some(&body));
    }

    fn stdio_op(command: &str) -> OperatorSignature {
        let mut operator = OperatorSignature::new(OperatorId::new(), OperatorType::Compute, command, "MCP");
        operator.source_registered_by_master = true;
        operator
    }

    #[tokio::test]
    async fn mcp_stdio_rejects_source_not_registered_by_master() {
        let mut operator = stdio_op("cat");
        operator.source_registered_by_master = false;

        let error = dispatch(&operator, &HashMap::new(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(error, OperatorError::McpStdioRejected(_)));
        assert!(error.to_string().to_lowercase().contains("master"));
    }

    #[tokio::test]
    async fn mcp_stdio_rejects_shell_metacharacters() {
        let operator = stdio_op("cat; rm -rf /");

        let error = dispatch(&operator, &HashMap::new(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(error, OperatorError::McpStdioRejected(_)));
        assert!(error.to_string().to_lowercase().contains("metacharacter"));
    }

    #[tokio::test]
    async fn mcp_stdio_round_trips_through_a_child_process() {
        let operator = stdio_op("cat");

        let outcome = dispatch(&operator, &HashMap::new(), Duration::from_secs(5)).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.body.get("method"), Some(&Value::String("tools/call".to_owned())));
    }
}
