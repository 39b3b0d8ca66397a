//! Tool descriptors, calls and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::source::{ToolCategory, ToolSource};

/// Argument map passed to every tool, whatever its transport
pub type ToolArguments = Map<String, Value>;

/// A tool as registered in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique across the registry
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// `local` or `{kind}:{connection}`
    pub source: ToolSource,
    /// Derived from `source`
    pub category: ToolCategory,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        source: ToolSource,
    ) -> Self {
        let category = source.category();
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            source,
            category,
        }
    }
}

/// Tool definition as it is handed to the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl From<&ToolDescriptor> for LlmTool {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema.clone(),
        }
    }
}

/// A tool as advertised by a remote provider (`tools/list` entry)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema", alias = "parameters")]
    pub input_schema: Option<Value>,
}

impl RemoteTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Parse a list of tool entries, dropping the ones without a usable name
    pub fn parse_list(items: &[Value]) -> Vec<RemoteTool> {
        items
            .iter()
            .filter_map(|item| serde_json::from_value::<RemoteTool>(item.clone()).ok())
            .filter(|tool| !tool.name.is_empty())
            .collect()
    }

    /// Build the registry descriptor for this tool
    pub fn into_descriptor(self, source: ToolSource) -> ToolDescriptor {
        ToolDescriptor::new(
            self.name,
            self.description.unwrap_or_default(),
            self.input_schema.unwrap_or_else(empty_object_schema),
            source,
        )
    }
}

/// `{"type": "object", "properties": {}}`
pub fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Validation failures when building a [`ToolCall`] from untrusted data
#[derive(Error, Debug, PartialEq)]
pub enum ToolCallError {
    #[error("tool call is missing the tool name")]
    MissingTool,

    #[error("tool call is missing its arguments")]
    MissingArguments,

    #[error("tool call arguments must be an object")]
    ArgumentsNotObject,

    #[error("invalid tool call: {0}")]
    Malformed(String),
}

/// A request to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool being called
    #[serde(rename = "tool")]
    pub tool_name: String,
    /// Input arguments for the tool
    pub arguments: ToolArguments,
    #[serde(rename = "requestedAt", default = "Utc::now")]
    pub requested_at: DateTime<Utc>,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(tool_name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            requested_at: Utc::now(),
        }
    }

    /// Build a tool call from a JSON object such as `{"tool": .., "arguments": {..}}`
    pub fn from_value(value: Value) -> Result<Self, ToolCallError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ToolCallError::Malformed("expected an object".to_string()))?;

        match obj.get("tool").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => {}
            _ => return Err(ToolCallError::MissingTool),
        }
        match obj.get("arguments") {
            None | Some(Value::Null) => return Err(ToolCallError::MissingArguments),
            Some(Value::Object(_)) => {}
            Some(_) => return Err(ToolCallError::ArgumentsNotObject),
        }

        serde_json::from_value(value).map_err(|e| ToolCallError::Malformed(e.to_string()))
    }

    /// Get an input argument by key
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key)
    }

    /// Get an input argument as a string
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    /// Get an input argument as an i64
    pub fn arg_i64(&self, key: &str) -> Option<i64> {
        self.arguments.get(key).and_then(|v| v.as_i64())
    }
}

/// Outcome of a tool call, reported as data rather than as an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(rename = "toolName")]
    pub tool_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "completedAt", default = "Utc::now")]
    pub completed_at: DateTime<Utc>,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(tool_name: impl Into<String>, result: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            result: Some(result),
            error: None,
            completed_at: Utc::now(),
        }
    }

    /// Create a failed tool result
    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            completed_at: Utc::now(),
        }
    }
}
