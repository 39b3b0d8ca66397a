//! Tool invocation capability

use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::connection::{ConnectionError, ToolConnection};
use crate::types::ToolArguments;

/// Errors from invoking a tool
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("connection '{0}' is no longer available")]
    ConnectionGone(String),

    #[error("{0}")]
    Failed(String),

    #[error("tool panicked: {0}")]
    Panicked(String),

    #[error("tool timed out after {0:?}")]
    Timeout(Duration),
}

/// Something that can run one tool
///
/// Created once when the tool is registered.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, arguments: ToolArguments) -> Result<Value, ToolError>;
}

/// Routes calls to the connection that advertised the tool
///
/// Holds a weak reference: the owning studio decides how long the
/// connection lives.
pub struct RemoteInvoker {
    connection: Weak<dyn ToolConnection>,
    connection_name: String,
    tool_name: String,
}

impl RemoteInvoker {
    pub fn new(
        connection: Weak<dyn ToolConnection>,
        connection_name: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            connection_name: connection_name.into(),
            tool_name: tool_name.into(),
        }
    }
}

#[async_trait]
impl ToolInvoker for RemoteInvoker {
    async fn invoke(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let connection = self
            .connection
            .upgrade()
            .ok_or_else(|| ToolError::ConnectionGone(self.connection_name.clone()))?;
        let raw = connection.call_tool(&self.tool_name, arguments).await?;
        normalize_remote_result(raw)
    }
}

/// Unwrap an MCP `{content, isError, structuredContent}` result
///
/// - `isError: true` becomes [`ToolError::Failed`] with the text content
/// - `structuredContent` wins over text; a lone `result` key is unwrapped
/// - a single text item holding JSON is parsed, other text is joined
///
/// Values of any other shape are returned unchanged.
pub fn normalize_remote_result(value: Value) -> Result<Value, ToolError> {
    let Value::Object(mut obj) = value else {
        return Ok(value);
    };
    let content = match obj.get("content") {
        Some(Value::Array(content)) => content.clone(),
        _ => return Ok(Value::Object(obj)),
    };

    let texts: Vec<&str> = content
        .iter()
        .filter(|item| item["type"] == "text")
        .filter_map(|item| item["text"].as_str())
        .collect();

    if obj.get("isError").and_then(Value::as_bool) == Some(true) {
        let message = if texts.is_empty() {
            "tool reported an error".to_string()
        } else {
            texts.join("\n")
        };
        return Err(ToolError::Failed(message));
    }

    if let Some(structured) = obj.remove("structuredContent").filter(|v| !v.is_null()) {
        return Ok(match structured {
            Value::Object(mut map) if map.len() == 1 && map.contains_key("result") => {
                map.remove("result").unwrap_or(Value::Null)
            }
            other => other,
        });
    }

    Ok(match texts.as_slice() {
        [] => Value::Array(content.clone()),
        [single] => serde_json::from_str(single).unwrap_or_else(|_| Value::String(single.to_string())),
        many => Value::String(many.join("\n")),
    })
}
