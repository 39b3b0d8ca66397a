//! Connection capability traits

use async_trait::async_trait;
use serde_json::Value;

use super::error::ConnectionResult;
use super::state::ConnectionState;
use crate::config::{ConfigResult, ConnectionDescriptor};
use crate::logging::SharedLogger;
use crate::types::{RemoteTool, ToolArguments, TransportKind};

/// One live provider of tools over a single transport
///
/// Implementations:
/// - `SubprocessClient`: Line-delimited JSON-RPC over a child's stdio
/// - `NetworkClient`: HTTP path cascade, JSON-RPC fallback or a delegated session
#[async_trait]
pub trait ToolConnection: Send + Sync {
    /// Operator-chosen connection name
    fn name(&self) -> &str;

    /// Transport family of this connection
    fn kind(&self) -> TransportKind;

    /// Current lifecycle state
    fn state(&self) -> ConnectionState;

    /// Whether calls are currently accepted
    fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Open the connection and perform any handshake
    async fn initialize(&self) -> ConnectionResult<()>;

    /// List the tools the provider advertises; errors yield an empty list
    async fn list_tools(&self) -> Vec<RemoteTool>;

    /// Invoke a tool by name
    async fn call_tool(&self, name: &str, arguments: ToolArguments) -> ConnectionResult<Value>;

    /// Release the underlying resources; idempotent
    async fn cleanup(&self) -> ConnectionResult<()>;
}

/// A connection a studio can build from a descriptor
pub trait ManagedConnection: ToolConnection + Sized + 'static {
    /// Transport family this connection type serves
    const KIND: TransportKind;

    /// Build an unconnected client for `descriptor`
    fn from_descriptor(descriptor: ConnectionDescriptor, logger: SharedLogger)
        -> ConfigResult<Self>;
}
