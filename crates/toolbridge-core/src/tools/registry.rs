//! Tool registry and dispatcher
//!
//! The ToolRegistry is the single call surface for:
//! - Merging tools from local code and every ready connection
//! - Resolving a tool name to its owning invoker
//! - Gating calls behind an approval step
//! - Reporting every outcome as a [`ToolResult`]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::invoker::{RemoteInvoker, ToolError, ToolInvoker};
use super::local::LocalTool;
use super::summary::ToolSummary;
use crate::approval::{ApprovalGate, ApprovalRequest, ConsoleApprovalGate};
use crate::connection::{ManagedConnection, ToolConnection};
use crate::logging::SharedLogger;
use crate::studio::{NetworkStudio, Studio, SubprocessStudio};
use crate::types::{LlmTool, ToolCall, ToolCategory, ToolDescriptor, ToolResult, ToolSource};
use crate::{log_debug, log_info, log_warn};

/// Error message for calls rejected by the approval gate
pub const DISAPPROVED: &str = "disapproved by user";

/// Filter for tool listings
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// If set, only include tools of these categories
    pub categories: Option<HashSet<ToolCategory>>,
    /// If set, only include tools from this connection
    pub connection: Option<String>,
    /// If set, only include tools with these names
    pub include: Option<HashSet<String>>,
    /// Exclude tools with these names
    pub exclude: HashSet<String>,
}

impl ToolFilter {
    /// Include all tools
    pub fn all() -> Self {
        Self::default()
    }

    /// Only tools of one category
    pub fn category(category: ToolCategory) -> Self {
        Self {
            categories: Some(HashSet::from([category])),
            ..Self::default()
        }
    }

    /// Only tools from the named connection
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Include only specific tools
    pub fn with_include(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.include = Some(names.into_iter().collect());
        self
    }

    /// Exclude specific tools
    pub fn with_exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude = names.into_iter().collect();
        self
    }

    /// Check if a tool matches this filter
    pub fn matches(&self, tool: &ToolDescriptor) -> bool {
        if let Some(ref categories) = self.categories {
            if !categories.contains(&tool.category) {
                return false;
            }
        }

        if let Some(ref connection) = self.connection {
            if tool.source.connection_name() != Some(connection.as_str()) {
                return false;
            }
        }

        if self.exclude.contains(&tool.name) {
            return false;
        }

        if let Some(ref include) = self.include {
            if !include.contains(&tool.name) {
                return false;
            }
        }

        true
    }
}

/// A resolved tool: what it is and how to run it
#[derive(Clone)]
pub struct ResolvedTool {
    pub descriptor: ToolDescriptor,
    pub invoker: Arc<dyn ToolInvoker>,
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    invoker: Arc<dyn ToolInvoker>,
    /// Registration sequence, for stable ordering
    seq: u64,
}

/// Registry of every available tool, keyed by name
///
/// Registering a name twice replaces the first entry.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, RegisteredTool>>,
    next_seq: AtomicU64,
    approval_enabled: AtomicBool,
    gate: RwLock<Arc<dyn ApprovalGate>>,
    call_timeout: Option<Duration>,
    logger: SharedLogger,
}

impl ToolRegistry {
    /// Create a registry with approval enabled, prompting on the console
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            approval_enabled: AtomicBool::new(true),
            gate: RwLock::new(Arc::new(ConsoleApprovalGate::stdio())),
            call_timeout: None,
            logger,
        }
    }

    /// Use a different approval gate
    pub fn with_gate(self, gate: Arc<dyn ApprovalGate>) -> Self {
        *self.gate.write() = gate;
        self
    }

    pub fn with_approval(self, enabled: bool) -> Self {
        self.set_approval_mode(enabled);
        self
    }

    /// Bound every dispatched call, whatever its transport
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn set_gate(&self, gate: Arc<dyn ApprovalGate>) {
        *self.gate.write() = gate;
    }

    pub fn set_approval_mode(&self, enabled: bool) {
        self.approval_enabled.store(enabled, Ordering::SeqCst);
        log_info!(
            self.logger,
            "[ToolRegistry] Approval {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn approval_enabled(&self) -> bool {
        self.approval_enabled.load(Ordering::SeqCst)
    }

    /// Register a tool; returns the descriptor it replaced, if any
    pub fn register(
        &self,
        descriptor: ToolDescriptor,
        invoker: Arc<dyn ToolInvoker>,
    ) -> Option<ToolDescriptor> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let name = descriptor.name.clone();
        let previous = self.tools.write().insert(
            name.clone(),
            RegisteredTool {
                descriptor,
                invoker,
                seq,
            },
        );

        previous.map(|old| {
            log_debug!(
                self.logger,
                "[ToolRegistry] '{}' from {} replaces the one from {}",
                name,
                self.source_of(&name).unwrap_or_default(),
                old.descriptor.source
            );
            old.descriptor
        })
    }

    fn source_of(&self, name: &str) -> Option<String> {
        self.tools
            .read()
            .get(name)
            .map(|tool| tool.descriptor.source.to_string())
    }

    pub fn register_local_tool(&self, tool: LocalTool) {
        let descriptor = tool.descriptor();
        self.register(descriptor, Arc::new(tool));
    }

    /// Register local tools; returns how many were added
    pub fn register_local_tools(&self, tools: impl IntoIterator<Item = LocalTool>) -> usize {
        let mut count = 0;
        for tool in tools {
            self.register_local_tool(tool);
            count += 1;
        }
        if count > 0 {
            log_info!(self.logger, "[ToolRegistry] Registered {} local tools", count);
        }
        count
    }

    /// List and register the tools of one connection
    pub async fn register_connection(&self, connection: Arc<dyn ToolConnection>) -> usize {
        let tools = connection.list_tools().await;
        let source = ToolSource::connection(connection.kind(), connection.name());
        let weak = Arc::downgrade(&connection);

        let count = tools.len();
        for tool in tools {
            let invoker = Arc::new(RemoteInvoker::new(
                weak.clone(),
                connection.name(),
                tool.name.clone(),
            ));
            self.register(tool.into_descriptor(source.clone()), invoker);
        }

        log_info!(
            self.logger,
            "[ToolRegistry] Loaded {} tools from {}",
            count,
            source
        );
        count
    }

    /// Replace the tools of a studio's kind with those of its ready connections
    pub async fn load_from_studio<C: ManagedConnection>(&self, studio: &Studio<C>) -> usize {
        self.remove_category(C::KIND.into());

        let mut total = 0;
        for connection in studio.initialized_connections() {
            let connection: Arc<dyn ToolConnection> = connection;
            total += self.register_connection(connection).await;
        }
        total
    }

    pub async fn load_from_subprocess_studio(&self, studio: &SubprocessStudio) -> usize {
        self.load_from_studio(studio).await
    }

    pub async fn load_from_network_studio(&self, studio: &NetworkStudio) -> usize {
        self.load_from_studio(studio).await
    }

    /// Drop every tool of a category; returns how many were removed
    pub fn remove_category(&self, category: ToolCategory) -> usize {
        let mut tools = self.tools.write();
        let before = tools.len();
        tools.retain(|_, tool| tool.descriptor.category != category);
        before - tools.len()
    }

    /// Drop all subprocess and network tools
    pub fn clear_remote(&self) -> usize {
        self.remove_category(ToolCategory::Subprocess) + self.remove_category(ToolCategory::Network)
    }

    pub fn unregister(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.write().remove(name).map(|tool| tool.descriptor)
    }

    /// Tools matching a filter: local, then subprocess, then network,
    /// registration order within a category
    pub fn tools(&self, filter: &ToolFilter) -> Vec<ToolDescriptor> {
        let tools = self.tools.read();
        let mut matching: Vec<&RegisteredTool> = tools
            .values()
            .filter(|tool| filter.matches(&tool.descriptor))
            .collect();
        matching.sort_by_key(|tool| (tool.descriptor.category, tool.seq));
        matching.into_iter().map(|tool| tool.descriptor.clone()).collect()
    }

    pub fn all_tools(&self) -> Vec<ToolDescriptor> {
        self.tools(&ToolFilter::all())
    }

    /// Tools of one category, optionally from one connection only
    pub fn tools_by_source(
        &self,
        category: ToolCategory,
        connection: Option<&str>,
    ) -> Vec<ToolDescriptor> {
        let mut filter = ToolFilter::category(category);
        if let Some(connection) = connection {
            filter = filter.with_connection(connection);
        }
        self.tools(&filter)
    }

    /// Tool definitions for the language model
    pub fn llm_tools(&self) -> Vec<LlmTool> {
        self.all_tools().iter().map(LlmTool::from).collect()
    }

    pub fn resolve(&self, name: &str) -> Option<ResolvedTool> {
        self.tools.read().get(name).map(|tool| ResolvedTool {
            descriptor: tool.descriptor.clone(),
            invoker: Arc::clone(&tool.invoker),
        })
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    pub fn summary(&self) -> ToolSummary {
        ToolSummary::from_descriptors(&self.all_tools())
    }

    /// Execute a tool call
    ///
    /// Never fails: unknown tools, rejected approvals, timeouts and tool
    /// errors all come back as a failed [`ToolResult`].
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(resolved) = self.resolve(&call.tool_name) else {
            log_warn!(self.logger, "[ToolRegistry] Tool '{}' not found", call.tool_name);
            return ToolResult::failure(&call.tool_name, format!("Tool '{}' not found", call.tool_name));
        };

        if self.approval_enabled() {
            let gate = Arc::clone(&*self.gate.read());
            let request = ApprovalRequest::new(&resolved.descriptor, &call.arguments);
            if !gate.request(request).await {
                log_info!(self.logger, "[ToolRegistry] '{}' {}", call.tool_name, DISAPPROVED);
                return ToolResult::failure(&call.tool_name, DISAPPROVED);
            }
        }

        log_info!(
            self.logger,
            "[ToolRegistry] Calling '{}' ({})",
            call.tool_name,
            resolved.descriptor.source
        );

        let invocation = resolved.invoker.invoke(call.arguments.clone());
        let outcome = match self.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, invocation)
                .await
                .unwrap_or(Err(ToolError::Timeout(timeout))),
            None => invocation.await,
        };

        match outcome {
            Ok(value) => ToolResult::success(&call.tool_name, value),
            Err(e) => {
                log_warn!(self.logger, "[ToolRegistry] '{}' failed: {}", call.tool_name, e);
                ToolResult::failure(&call.tool_name, e.to_string())
            }
        }
    }

    /// Execute calls one after another, in order
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call).await);
        }
        results
    }
}
