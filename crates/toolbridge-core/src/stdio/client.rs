//! Subprocess tool client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;

use super::launcher::{BoxedReader, CommandLauncher, ProcessHandle, ProcessLauncher};
use super::transport::LineTransport;
use crate::config::{ConfigError, ConfigResult, ConnectionDescriptor, SubprocessParams};
use crate::connection::{
    ConnectionError, ConnectionResult, ConnectionState, ManagedConnection, StateCell,
    ToolConnection,
};
use crate::logging::SharedLogger;
use crate::types::{RemoteTool, ToolArguments, TransportKind};
use crate::{log_debug, log_error, log_info, log_warn};

/// Protocol revision sent in the `initialize` handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest stderr tail kept in an initialization error
const STDERR_TAIL_CHARS: usize = 2000;
const STDERR_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// A tool server running as a child process, spoken to over stdio
///
/// Calls are serialized: one request is in flight at a time and concurrent
/// callers queue on the transport lock.
pub struct SubprocessClient {
    name: String,
    params: SubprocessParams,
    launcher: Arc<dyn ProcessLauncher>,
    logger: SharedLogger,
    state: StateCell,
    transport: RwLock<Option<Arc<LineTransport>>>,
    process: tokio::sync::Mutex<Option<Box<dyn ProcessHandle>>>,
    stderr_task: Mutex<Option<JoinHandle<()>>>,
    /// Serializes initialize and cleanup
    lifecycle: tokio::sync::Mutex<()>,
    init_timeout: Duration,
    call_timeout: Duration,
    shutdown_timeout: Duration,
}

impl SubprocessClient {
    /// Create a client for a subprocess descriptor
    pub fn new(descriptor: ConnectionDescriptor, logger: SharedLogger) -> ConfigResult<Self> {
        descriptor.expect_kind(TransportKind::Subprocess)?;
        let params = descriptor
            .as_subprocess()
            .cloned()
            .ok_or_else(|| ConfigError::MissingField {
                server: descriptor.name().to_string(),
                field: "command",
            })?;

        Ok(Self {
            name: descriptor.name().to_string(),
            params,
            launcher: Arc::new(CommandLauncher),
            logger,
            state: StateCell::new(),
            transport: RwLock::new(None),
            process: tokio::sync::Mutex::new(None),
            stderr_task: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            init_timeout: DEFAULT_INIT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    /// Use a different process launcher
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn params(&self) -> &SubprocessParams {
        &self.params
    }

    fn tag(&self) -> String {
        format!("[SubprocessClient:{}]", self.name)
    }

    fn ready_transport(&self) -> ConnectionResult<Arc<LineTransport>> {
        if self.state.get() != ConnectionState::Ready {
            return Err(ConnectionError::NotInitialized(self.name.clone()));
        }
        self.transport
            .read()
            .clone()
            .ok_or_else(|| ConnectionError::NotInitialized(self.name.clone()))
    }

    async fn handshake(transport: &LineTransport) -> ConnectionResult<Value> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "toolbridge",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let info = transport.request("initialize", Some(params)).await?;
        transport.notify("notifications/initialized", None).await?;
        Ok(info)
    }

    async fn fail_initialization(
        &self,
        mut handle: Box<dyn ProcessHandle>,
        stderr: Option<BoxedReader>,
        reason: String,
    ) -> ConnectionError {
        let _ = handle.kill().await;
        let tail = read_stderr_tail(stderr).await;
        self.state.set(ConnectionState::Failed);

        let message = if tail.is_empty() {
            reason
        } else {
            format!("{} (stderr: {})", reason, tail)
        };
        log_error!(self.logger, "{} Initialization failed: {}", self.tag(), message);
        ConnectionError::Handshake(message)
    }

    fn drain_stderr(&self, stderr: BoxedReader) {
        let logger = Arc::clone(&self.logger);
        let tag = self.tag();
        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log_debug!(logger, "{} stderr: {}", tag, line);
            }
        });
        *self.stderr_task.lock() = Some(task);
    }
}

#[async_trait]
impl ToolConnection for SubprocessClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Subprocess
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    async fn initialize(&self) -> ConnectionResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state.get() == ConnectionState::Ready {
            return Ok(());
        }
        let guard = self.state.begin_initializing().map_err(|state| {
            ConnectionError::Handshake(format!("cannot initialize a {} connection", state))
        })?;

        log_info!(
            self.logger,
            "{} Starting '{}' {:?}",
            self.tag(),
            self.params.command,
            self.params.args
        );

        let launched = match self.launcher.launch(&self.params) {
            Ok(launched) => launched,
            Err(e) => {
                log_error!(self.logger, "{} {}", self.tag(), e);
                return Err(e);
            }
        };

        let transport = Arc::new(LineTransport::new(launched.stdin, launched.stdout));
        let outcome = tokio::time::timeout(self.init_timeout, Self::handshake(&transport)).await;

        let info = match outcome {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                return Err(self
                    .fail_initialization(launched.handle, launched.stderr, e.to_string())
                    .await)
            }
            Err(_) => {
                let reason = format!("initialization timed out after {:?}", self.init_timeout);
                return Err(self
                    .fail_initialization(launched.handle, launched.stderr, reason)
                    .await);
            }
        };

        if let Some(stderr) = launched.stderr {
            self.drain_stderr(stderr);
        }
        *self.process.lock().await = Some(launched.handle);
        *self.transport.write() = Some(transport);
        guard.ready();

        let server = info["serverInfo"]["name"].as_str().unwrap_or("unknown");
        log_info!(self.logger, "{} Connected to server '{}'", self.tag(), server);
        Ok(())
    }

    async fn list_tools(&self) -> Vec<RemoteTool> {
        let transport = match self.ready_transport() {
            Ok(transport) => transport,
            Err(e) => {
                log_warn!(self.logger, "{} Cannot list tools: {}", self.tag(), e);
                return Vec::new();
            }
        };

        let outcome = tokio::time::timeout(self.call_timeout, transport.request("tools/list", None)).await;
        match outcome {
            Ok(Ok(result)) => {
                let items = result["tools"].as_array().cloned().unwrap_or_default();
                let tools = RemoteTool::parse_list(&items);
                log_debug!(self.logger, "{} Listed {} tools", self.tag(), tools.len());
                tools
            }
            Ok(Err(e)) => {
                log_warn!(self.logger, "{} tools/list failed: {}", self.tag(), e);
                Vec::new()
            }
            Err(_) => {
                log_warn!(self.logger, "{} tools/list timed out", self.tag());
                Vec::new()
            }
        }
    }

    async fn call_tool(&self, name: &str, arguments: ToolArguments) -> ConnectionResult<Value> {
        let transport = self.ready_transport()?;
        log_debug!(self.logger, "{} Calling '{}'", self.tag(), name);

        let params = json!({ "name": name, "arguments": arguments });
        tokio::time::timeout(self.call_timeout, transport.request("tools/call", Some(params)))
            .await
            .map_err(|_| ConnectionError::Timeout(self.call_timeout))?
    }

    async fn cleanup(&self) -> ConnectionResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state.get() != ConnectionState::Ready {
            return Ok(());
        }
        self.state.set(ConnectionState::Closed);

        // Dropping the transport closes the child's stdin
        self.transport.write().take();

        if let Some(mut handle) = self.process.lock().await.take() {
            match tokio::time::timeout(self.shutdown_timeout, handle.wait()).await {
                Ok(Ok(())) => {}
                _ => {
                    log_warn!(
                        self.logger,
                        "{} Process did not exit within {:?}, killing",
                        self.tag(),
                        self.shutdown_timeout
                    );
                    handle.kill().await?;
                }
            }
        }
        if let Some(task) = self.stderr_task.lock().take() {
            task.abort();
        }

        log_info!(self.logger, "{} Closed", self.tag());
        Ok(())
    }
}

impl ManagedConnection for SubprocessClient {
    const KIND: TransportKind = TransportKind::Subprocess;

    fn from_descriptor(descriptor: ConnectionDescriptor, logger: SharedLogger) -> ConfigResult<Self> {
        Self::new(descriptor, logger)
    }
}

async fn read_stderr_tail(stderr: Option<BoxedReader>) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = tokio::time::timeout(STDERR_READ_TIMEOUT, stderr.read_to_end(&mut buf)).await;

    let text = String::from_utf8_lossy(&buf);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    text.chars().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger, NoOpLogger};
    use crate::stdio::mock::{MockHandshake, MockServer, MockTool};

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::subprocess("calc", SubprocessParams::new("calc-server")).unwrap()
    }

    fn client(server: MockServer) -> SubprocessClient {
        SubprocessClient::new(descriptor(), Arc::new(NoOpLogger))
            .unwrap()
            .with_launcher(Arc::new(server))
    }

    #[tokio::test]
    async fn test_lifecycle_and_calls() {
        let server = MockServer::new(vec![MockTool::echo(), MockTool::add()]).noisy();
        let stats = server.stats();
        let client = client(server);

        assert_eq!(client.state(), ConnectionState::Uninitialized);
        let err = client.call_tool("add", ToolArguments::new()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotInitialized(_)));

        client.initialize().await.unwrap();
        assert!(client.is_ready());

        let tools = client.list_tools().await;
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "add"]);

        let mut args = ToolArguments::new();
        args.insert("a".into(), json!(2));
        args.insert("b".into(), json!(5));
        let result = client.call_tool("add", args).await.unwrap();
        assert_eq!(result["structuredContent"]["result"], json!(7));

        client.cleanup().await.unwrap();
        client.cleanup().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(!stats.was_killed());
        assert_eq!(
            stats.methods()[..2],
            ["initialize".to_string(), "notifications/initialized".to_string()]
        );
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_serialized() {
        let server = MockServer::new(vec![MockTool::add()]).with_call_delay(Duration::from_millis(20));
        let stats = server.stats();
        let client = Arc::new(client(server));
        client.initialize().await.unwrap();

        let mut calls = Vec::new();
        for i in 0..5 {
            let client = Arc::clone(&client);
            calls.push(tokio::spawn(async move {
                let mut args = ToolArguments::new();
                args.insert("a".into(), json!(i));
                args.insert("b".into(), json!(100));
                client.call_tool("add", args).await
            }));
        }
        for (i, call) in calls.into_iter().enumerate() {
            let result = call.await.unwrap().unwrap();
            assert_eq!(result["structuredContent"]["result"], json!(i as i64 + 100));
        }

        assert_eq!(stats.count("tools/call"), 5);
        assert_eq!(stats.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_rejected_handshake_captures_stderr() {
        let server = MockServer::new(vec![])
            .with_handshake(MockHandshake::Reject("bad protocol".into()))
            .with_stderr("Traceback: ImportError: no module named foo\n");
        let stats = server.stats();
        let logger = Arc::new(MemoryLogger::new());
        let client = SubprocessClient::new(descriptor(), logger.clone())
            .unwrap()
            .with_launcher(Arc::new(server));

        let err = client.initialize().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("bad protocol"), "{message}");
        assert!(message.contains("ImportError"), "{message}");
        assert_eq!(client.state(), ConnectionState::Failed);
        assert!(stats.was_killed());
        assert!(logger.contains(LogLevel::Error, "Initialization failed"));
        assert!(client.list_tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let server = MockServer::new(vec![]).with_handshake(MockHandshake::Hang);
        let client = client(server).with_init_timeout(Duration::from_millis(50));

        let err = client.initialize().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(client.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_handshake_leaves_failed() {
        let server = MockServer::new(vec![]).with_handshake(MockHandshake::Hang);
        let stats = server.stats();
        let client = client(server);

        let outcome = tokio::time::timeout(Duration::from_millis(50), client.initialize()).await;
        assert!(outcome.is_err());
        assert_eq!(client.state(), ConnectionState::Failed);

        let err = client.initialize().await.unwrap_err();
        assert!(err.to_string().contains("failed"), "{err}");
        assert_eq!(stats.launches(), 1);
    }

    #[tokio::test]
    async fn test_failed_connection_is_not_relaunched() {
        let server = MockServer::new(vec![]).with_handshake(MockHandshake::Reject("nope".into()));
        let stats = server.stats();
        let client = client(server);

        assert!(client.initialize().await.is_err());
        assert!(client.initialize().await.is_err());
        assert_eq!(client.state(), ConnectionState::Failed);
        assert_eq!(stats.launches(), 1);
    }

    #[tokio::test]
    async fn test_call_timeout_keeps_connection_ready() {
        let server = MockServer::new(vec![MockTool::echo()]).with_call_delay(Duration::from_millis(200));
        let client = client(server).with_call_timeout(Duration::from_millis(20));
        client.initialize().await.unwrap();

        let err = client.call_tool("echo", ToolArguments::new()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Timeout(_)));
        assert!(client.is_ready());
        client.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_failure_marks_failed() {
        let descriptor = ConnectionDescriptor::subprocess(
            "missing",
            SubprocessParams::new("definitely-not-a-real-binary-4f2a"),
        )
        .unwrap();
        let client = SubprocessClient::new(descriptor, Arc::new(NoOpLogger)).unwrap();

        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Spawn { .. }));
        assert_eq!(client.state(), ConnectionState::Failed);
    }
}
