//! Core data types shared across transports and the registry

mod source;
mod tool;
mod jsonrpc;

pub use source::{ToolCategory, ToolSource, TransportKind};
pub use tool::{
    empty_object_schema, LlmTool, RemoteTool, ToolArguments, ToolCall, ToolCallError,
    ToolDescriptor, ToolResult,
};
pub use jsonrpc::{error_codes, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
