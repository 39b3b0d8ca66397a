//! Toolbridge Core
//!
//! Tool orchestration for LLM agents. Tools live behind independently
//! operated servers: child processes speaking newline-delimited JSON-RPC
//! over stdio, and HTTP services speaking either a REST-style convention
//! or JSON-RPC. This crate connects to them, merges their tools with local
//! ones into a single registry and dispatches calls through an optional
//! approval step.
//!
//! ## Flow
//!
//! ```text
//! ServersConfig -> Studio (connect) -> tools/list -> ToolRegistry
//!                                                      │
//!              ToolCall -> resolve -> ApprovalGate -> ToolInvoker -> ToolResult
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolbridge_core::{default_logger, ServersConfig, ToolCall, ToolHub};
//!
//! let config = ServersConfig::from_json_str(&config_text)?;
//! let hub = Arc::new(ToolHub::from_config(&config, default_logger())?);
//! hub.start(Vec::new()).await?;
//!
//! // Tool definitions for the model
//! let tools = hub.registry().llm_tools();
//!
//! // Execute what the model asked for
//! let result = hub.registry().execute(&call).await;
//!
//! hub.shutdown().await;
//! ```

pub mod types;
pub mod logging;
pub mod config;
pub mod connection;
pub mod stdio;
pub mod http;
pub mod studio;
pub mod approval;
pub mod tools;
pub mod hub;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use types::{
    LlmTool, RemoteTool, ToolArguments, ToolCall, ToolCallError, ToolCategory, ToolDescriptor,
    ToolResult, ToolSource, TransportKind,
};

pub use logging::{default_logger, ConsoleLogger, Logger, NoOpLogger, SharedLogger, TracingLogger};

pub use config::{
    ConfigError, ConfigResult, ConnectionDescriptor, NetworkParams, NetworkStyle,
    ServersConfig, SubprocessParams,
};

pub use connection::{
    ConnectionError, ConnectionResult, ConnectionState, ManagedConnection, ToolConnection,
};

pub use stdio::{CommandLauncher, ProcessLauncher, SubprocessClient};

pub use http::{DelegatedAdapter, DelegatedSession, NetworkClient, RmcpAdapter};

pub use studio::{InitPolicy, InitReport, NetworkStudio, Studio, StudioError, SubprocessStudio};

pub use approval::{
    ApprovalGate, ApprovalRequest, ConsoleApprovalGate, PendingApproval, QueuedApprovalGate,
    StaticApprovalGate,
};

pub use tools::{
    builtin_tools, LocalTool, ToolError, ToolFilter, ToolInvoker, ToolRegistry, ToolSummary,
    Workspace,
};

pub use hub::{HubError, HubResult, StartReport, ToolHub};
