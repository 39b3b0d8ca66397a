//! Test doubles shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::config::{ConfigResult, ConnectionDescriptor};
use crate::connection::{
    ConnectionError, ConnectionResult, ConnectionState, ManagedConnection, StateCell,
    ToolConnection,
};
use crate::logging::SharedLogger;
use crate::types::{RemoteTool, ToolArguments, TransportKind};

/// Connection that records what was asked of it
pub(crate) struct SpyConnection {
    name: String,
    kind: TransportKind,
    state: StateCell,
    tools: Vec<RemoteTool>,
    fail_init: bool,
    calls: AtomicUsize,
    cleanups: AtomicUsize,
    journal: Arc<Mutex<Vec<String>>>,
}

impl SpyConnection {
    pub fn new(name: &str, kind: TransportKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            state: StateCell::new(),
            tools: Vec::new(),
            fail_init: false,
            calls: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tools(mut self, names: &[&str]) -> Self {
        self.tools = names
            .iter()
            .map(|name| RemoteTool::new(*name, format!("{} tool", name)))
            .collect();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Share a journal of `init:<name>` / `cleanup:<name>` entries
    pub fn with_journal(mut self, journal: Arc<Mutex<Vec<String>>>) -> Self {
        self.journal = journal;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolConnection for SpyConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    async fn initialize(&self) -> ConnectionResult<()> {
        self.journal.lock().push(format!("init:{}", self.name));
        if self.fail_init {
            self.state.set(ConnectionState::Failed);
            return Err(ConnectionError::Handshake(format!("{} refused", self.name)));
        }
        self.state.set(ConnectionState::Ready);
        Ok(())
    }

    async fn list_tools(&self) -> Vec<RemoteTool> {
        if self.is_ready() {
            self.tools.clone()
        } else {
            Vec::new()
        }
    }

    async fn call_tool(&self, name: &str, arguments: ToolArguments) -> ConnectionResult<Value> {
        if !self.is_ready() {
            return Err(ConnectionError::NotInitialized(self.name.clone()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "connection": self.name, "tool": name, "arguments": arguments }))
    }

    async fn cleanup(&self) -> ConnectionResult<()> {
        if self.state.get() == ConnectionState::Ready {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            self.journal.lock().push(format!("cleanup:{}", self.name));
            self.state.set(ConnectionState::Closed);
        }
        Ok(())
    }
}

impl ManagedConnection for SpyConnection {
    const KIND: TransportKind = TransportKind::Subprocess;

    fn from_descriptor(descriptor: ConnectionDescriptor, _logger: SharedLogger) -> ConfigResult<Self> {
        Ok(Self::new(descriptor.name(), descriptor.kind()))
    }
}
