//! Approval gate trait

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{ToolArguments, ToolDescriptor, ToolSource};

/// What a human is asked to approve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalRequest {
    #[serde(rename = "toolName")]
    pub tool_name: String,
    pub arguments: ToolArguments,
    pub description: String,
    pub source: ToolSource,
}

impl ApprovalRequest {
    pub fn new(descriptor: &ToolDescriptor, arguments: &ToolArguments) -> Self {
        Self {
            tool_name: descriptor.name.clone(),
            arguments: arguments.clone(),
            description: descriptor.description.clone(),
            source: descriptor.source.clone(),
        }
    }
}

/// Human confirmation step between tool resolution and execution
///
/// Implementations:
/// - `ConsoleApprovalGate`: Prompts on a terminal
/// - `StaticApprovalGate`: Fixed answer
/// - `QueuedApprovalGate`: Hands requests to the host over a channel
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Returns `true` to let the call through
    async fn request(&self, request: ApprovalRequest) -> bool;
}
