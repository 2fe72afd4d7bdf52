use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use syncline_common::error::SynclineError;

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone)]
pub struct McpConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<McpError> for SynclineError {
    fn from(e: McpError) -> Self {
        SynclineError::Source(e.to_string())
    }
}

/// One initialized tool-calling session against an MCP endpoint.
///
/// The handle is created at crawl start, passed by reference into every
/// source call and dropped at crawl end; no process-wide session state.
/// Calls are single-attempt with a fixed timeout; transient failures are the
/// caller's problem (scope-local, per the crawl error model).
#[derive(Debug)]
pub struct McpSession {
    http: Client,
    base_url: String,
    session_id: String,
    next_id: AtomicU64,
}

impl McpSession {
    /// Perform the initialize handshake and return a ready session.
    pub async fn connect(config: &McpConfig) -> Result<Self, McpError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let init = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "roots": { "listChanged": true },
                    "sampling": {}
                },
                "clientInfo": {
                    "name": "syncline-crawler",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }
        });

        let response = http
            .post(format!("{}/mcp", config.base_url))
            .header("Accept", "application/json, text/event-stream")
            .header("MCP-Protocol-Version", PROTOCOL_VERSION)
            .json(&init)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Http { status, body });
        }

        // The endpoint assigns the session id via header; fall back to a
        // locally generated one for servers that omit it.
        let session_id = response
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("session-{}", Uuid::new_v4()));

        let session = Self {
            http,
            base_url: config.base_url.clone(),
            session_id,
            next_id: AtomicU64::new(1),
        };
        session.notify_initialized().await;
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn notify_initialized(&self) {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        });

        match self.post(&body).await {
            Ok(_) => tracing::debug!(session = %self.session_id, "initialized notification sent"),
            Err(e) => {
                tracing::warn!(error = %e, "initialized notification failed, continuing")
            }
        }
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, McpError> {
        self.http
            .post(format!("{}/mcp", self.base_url))
            .header("Accept", "application/json, text/event-stream")
            .header("MCP-Protocol-Version", PROTOCOL_VERSION)
            .header("Mcp-Session-Id", &self.session_id)
            .json(body)
            .send()
            .await
            .map_err(McpError::from)
    }

    /// Invoke one tool and return its decoded payload.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        });

        let response = self.post(&body).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(McpError::Http { status, body: text });
        }

        let message = parse_rpc_body(&text)?;
        unwrap_tool_result(message)
    }
}

/// Parse a response body that is either a plain JSON-RPC message or an SSE
/// stream carrying the message in a `data:` line.
fn parse_rpc_body(text: &str) -> Result<Value, McpError> {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Ok(v);
    }

    for line in text.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(v) = serde_json::from_str::<Value>(data) {
                return Ok(v);
            }
        }
    }

    let head: String = text.chars().take(200).collect();
    Err(McpError::Protocol(format!("unparseable response: {head}")))
}

/// Unwrap the tool-result content envelope: the payload lives in the first
/// text content item, itself JSON-encoded; non-JSON text is passed through
/// as a string.
fn unwrap_tool_result(message: Value) -> Result<Value, McpError> {
    if let Some(err) = message.get("error") {
        let detail = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(McpError::Protocol(detail.to_string()));
    }

    let result = message.get("result").cloned().unwrap_or(Value::Null);

    if let Some(content) = result.get("content").and_then(Value::as_array) {
        let text = content
            .iter()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|item| item.get("text"))
            .and_then(Value::as_str);
        if let Some(text) = text {
            return Ok(serde_json::from_str(text).unwrap_or(Value::String(text.to_string())));
        }
    }

    Ok(result)
}
