//! Direct HTTP style: REST-ish path cascade with a JSON-RPC fallback

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value};

use crate::config::NetworkParams;
use crate::connection::{ConnectionError, ConnectionResult};
use crate::logging::SharedLogger;
use crate::types::{JsonRpcRequest, RemoteTool, ToolArguments};
use crate::{log_debug, log_info, log_warn};

/// Response header carrying the server-assigned session token
pub const SESSION_HEADER: &str = "mcp-session-id";

pub const CLIENT_USER_AGENT: &str = concat!("toolbridge/", env!("CARGO_PKG_VERSION"));

const PROBE_PATHS: [&str; 3] = ["/", "/health", "/status"];
const TOOL_PATHS: [&str; 3] = ["/tools", "/api/tools", "/mcp/tools"];

/// Keep error bodies short in messages
const ERROR_BODY_CHARS: usize = 500;

/// HTTP client for servers without a delegated adapter
pub struct DirectTransport {
    tag: String,
    params: NetworkParams,
    client: Client,
    session: RwLock<Option<String>>,
    next_id: AtomicU64,
    logger: SharedLogger,
}

impl DirectTransport {
    /// Build the HTTP client; fails on headers that are not valid HTTP
    pub fn new(name: &str, params: NetworkParams, logger: SharedLogger) -> ConnectionResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (key, value) in &params.headers {
            let key = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ConnectionError::Transport(format!("invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConnectionError::Transport(format!("invalid value for header '{}': {}", key, e)))?;
            headers.insert(key, value);
        }

        let client = Client::builder()
            .timeout(params.timeout)
            .danger_accept_invalid_certs(!params.tls_verify)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            tag: format!("[NetworkClient:{}]", name),
            params,
            client,
            session: RwLock::new(None),
            next_id: AtomicU64::new(1),
            logger,
        })
    }

    /// Captured session token, if the server sent one
    pub fn session_id(&self) -> Option<String> {
        self.session.read().clone()
    }

    pub fn clear_session(&self) {
        self.session.write().take();
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.read().as_deref() {
            Some(session) => request.header(SESSION_HEADER, session),
            None => request,
        }
    }

    fn capture_session(&self, response: &Response) {
        let Some(value) = response.headers().get(SESSION_HEADER) else {
            return;
        };
        if let Ok(session) = value.to_str() {
            let mut current = self.session.write();
            if current.as_deref() != Some(session) {
                log_debug!(self.logger, "{} Session id {}", self.tag, session);
                *current = Some(session.to_string());
            }
        }
    }

    async fn send(&self, request: RequestBuilder) -> reqwest::Result<Response> {
        let response = self.with_session(request).send().await?;
        self.capture_session(&response);
        Ok(response)
    }

    /// GET the probe paths; returns the first path answering below 500
    pub async fn probe(&self) -> Option<&'static str> {
        for path in PROBE_PATHS {
            match self.send(self.client.get(self.params.endpoint(path))).await {
                Ok(response) if response.status().as_u16() < 500 => {
                    log_info!(
                        self.logger,
                        "{} Reachable at {} (status {})",
                        self.tag,
                        path,
                        response.status().as_u16()
                    );
                    return Some(path);
                }
                Ok(response) => {
                    log_debug!(self.logger, "{} Probe {} returned {}", self.tag, path, response.status());
                }
                Err(e) => {
                    log_debug!(self.logger, "{} Probe {} failed: {}", self.tag, path, e);
                }
            }
        }
        log_warn!(self.logger, "{} No probe path answered; continuing", self.tag);
        None
    }

    /// List tools through the path cascade, then `tools/list` over JSON-RPC
    pub async fn list_tools(&self) -> ConnectionResult<Vec<RemoteTool>> {
        for path in TOOL_PATHS {
            let url = self.params.endpoint(path);
            let response = match self.send(self.client.get(&url)).await {
                Ok(response) => response,
                Err(e) => {
                    log_debug!(self.logger, "{} GET {} failed: {}", self.tag, path, e);
                    continue;
                }
            };
            let status = response.status();
            if status != StatusCode::OK {
                if status != StatusCode::NOT_FOUND {
                    log_warn!(self.logger, "{} GET {} returned {}", self.tag, path, status);
                }
                continue;
            }
            match response.json::<Value>().await {
                Ok(body) => {
                    let tools = parse_tool_listing(&body);
                    log_info!(self.logger, "{} Listed {} tools from {}", self.tag, tools.len(), path);
                    return Ok(tools);
                }
                Err(e) => {
                    log_warn!(self.logger, "{} GET {} returned invalid JSON: {}", self.tag, path, e);
                }
            }
        }

        log_debug!(self.logger, "{} Falling back to JSON-RPC tools/list", self.tag);
        let result = self.json_rpc("tools/list", None).await?;
        let items = result["tools"].as_array().cloned().unwrap_or_default();
        Ok(RemoteTool::parse_list(&items))
    }

    /// Call a tool through the path cascade, then `tools/call` over JSON-RPC
    pub async fn call_tool(&self, name: &str, arguments: ToolArguments) -> ConnectionResult<Value> {
        let body = json!({
            "tool": name,
            "arguments": arguments,
            "timestamp": Utc::now().to_rfc3339(),
        });

        for prefix in TOOL_PATHS {
            let url = match self.tool_url(prefix, name) {
                Ok(url) => url,
                Err(e) => {
                    log_warn!(self.logger, "{} {}", self.tag, e);
                    break;
                }
            };
            let response = match self.send(self.client.post(url).json(&body)).await {
                Ok(response) => response,
                Err(e) => {
                    log_debug!(self.logger, "{} POST {}/{} failed: {}", self.tag, prefix, name, e);
                    continue;
                }
            };
            let status = response.status();
            if status != StatusCode::OK {
                if status != StatusCode::NOT_FOUND {
                    log_warn!(self.logger, "{} POST {}/{} returned {}", self.tag, prefix, name, status);
                }
                continue;
            }
            match response.json::<Value>().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    log_warn!(self.logger, "{} POST {}/{} returned invalid JSON: {}", self.tag, prefix, name, e);
                }
            }
        }

        log_debug!(self.logger, "{} Falling back to JSON-RPC tools/call for '{}'", self.tag, name);
        self.json_rpc(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    fn tool_url(&self, prefix: &str, name: &str) -> ConnectionResult<Url> {
        let mut url = Url::parse(&self.params.endpoint(prefix))
            .map_err(|e| ConnectionError::Transport(format!("invalid tool URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ConnectionError::Transport("base URL cannot carry a path".to_string()))?
            .push(name);
        Ok(url)
    }

    /// POST a JSON-RPC request to the base URL
    ///
    /// A body without `result` or `error` is returned whole.
    pub async fn json_rpc(&self, method: &str, params: Option<Value>) -> ConnectionResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let response = self
            .send(self.client.post(&self.params.base_url).json(&request))
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectionError::Http {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_CHARS),
            });
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| ConnectionError::Transport(format!("invalid JSON-RPC response: {}", e)))?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            return Err(ConnectionError::Remote {
                code: error["code"].as_i64().unwrap_or_default(),
                message: error["message"].as_str().unwrap_or("unknown error").to_string(),
            });
        }
        match body.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Ok(body),
        }
    }
}

/// `{tools: [...]}` or a bare list; anything else lists nothing
fn parse_tool_listing(body: &Value) -> Vec<RemoteTool> {
    match body {
        Value::Array(items) => RemoteTool::parse_list(items),
        Value::Object(obj) => obj
            .get("tools")
            .and_then(Value::as_array)
            .map(|items| RemoteTool::parse_list(items))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_listing_shapes() {
        let wrapped = json!({ "tools": [{ "name": "a" }, { "name": "b" }] });
        assert_eq!(parse_tool_listing(&wrapped).len(), 2);

        let bare = json!([{ "name": "a" }]);
        assert_eq!(parse_tool_listing(&bare).len(), 1);

        assert!(parse_tool_listing(&json!({ "items": [] })).is_empty());
        assert!(parse_tool_listing(&json!("tools")).is_empty());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
