//! In-memory tool server for testing
//!
//! [`MockServer`] implements [`ProcessLauncher`] and answers the JSON-RPC
//! protocol over `tokio::io::duplex` pipes, so subprocess clients can be
//! exercised without spawning anything.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use super::launcher::{LaunchedProcess, ProcessHandle, ProcessLauncher};
use crate::config::SubprocessParams;
use crate::connection::ConnectionResult;
use crate::types::{error_codes, ToolArguments};

const PIPE_CAPACITY: usize = 64 * 1024;

type MockHandler = Arc<dyn Fn(&ToolArguments) -> Result<Value, String> + Send + Sync>;

/// A tool served by the mock
#[derive(Clone)]
pub struct MockTool {
    name: String,
    description: String,
    handler: MockHandler,
}

impl MockTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ToolArguments) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(handler),
        }
    }

    /// Returns its `text` argument
    pub fn echo() -> Self {
        Self::new("echo", "Echo the given text", |args| {
            Ok(args.get("text").cloned().unwrap_or(Value::Null))
        })
    }

    /// Adds integer arguments `a` and `b`
    pub fn add() -> Self {
        Self::new("add", "Add two integers", |args| {
            let a = args.get("a").and_then(Value::as_i64).ok_or("missing 'a'")?;
            let b = args.get("b").and_then(Value::as_i64).ok_or("missing 'b'")?;
            Ok(json!(a + b))
        })
    }
}

/// How the mock answers `initialize`
#[derive(Debug, Clone, Default)]
pub enum MockHandshake {
    #[default]
    Accept,
    /// Reply with a JSON-RPC error
    Reject(String),
    /// Never reply
    Hang,
}

/// Counters shared between a [`MockServer`] and its launched processes
#[derive(Debug, Default)]
pub struct MockStats {
    launches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    killed: AtomicBool,
    methods: Mutex<Vec<String>>,
}

impl MockStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Highest number of `tools/call` requests seen at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Methods received, in arrival order (notifications included)
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.methods.lock().iter().filter(|m| *m == method).count()
    }
}

/// Scripted JSON-RPC tool server
pub struct MockServer {
    tools: Vec<MockTool>,
    handshake: MockHandshake,
    call_delay: Duration,
    noisy: bool,
    stderr: Option<String>,
    stats: Arc<MockStats>,
}

impl MockServer {
    pub fn new(tools: Vec<MockTool>) -> Self {
        Self {
            tools,
            handshake: MockHandshake::Accept,
            call_delay: Duration::ZERO,
            noisy: false,
            stderr: None,
            stats: Arc::new(MockStats::default()),
        }
    }

    pub fn with_handshake(mut self, handshake: MockHandshake) -> Self {
        self.handshake = handshake;
        self
    }

    /// Delay each `tools/call` response
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Write log lines and a stale response to stdout before each reply
    pub fn noisy(mut self) -> Self {
        self.noisy = true;
        self
    }

    /// Text written to stderr on start
    pub fn with_stderr(mut self, text: impl Into<String>) -> Self {
        self.stderr = Some(text.into());
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

impl ProcessLauncher for MockServer {
    fn launch(&self, _params: &SubprocessParams) -> ConnectionResult<LaunchedProcess> {
        self.stats.launches.fetch_add(1, Ordering::SeqCst);

        let (client_stdin, server_stdin) = duplex(PIPE_CAPACITY);
        let (server_stdout, client_stdout) = duplex(PIPE_CAPACITY);
        let (mut server_stderr, client_stderr) = duplex(PIPE_CAPACITY);

        let session = Arc::new(MockSession {
            tools: self.tools.clone(),
            handshake: self.handshake.clone(),
            call_delay: self.call_delay,
            noisy: self.noisy,
            stats: Arc::clone(&self.stats),
            stdout: tokio::sync::Mutex::new(server_stdout),
        });
        let stderr = self.stderr.clone();

        let task = tokio::spawn(async move {
            if let Some(text) = stderr {
                let _ = server_stderr.write_all(text.as_bytes()).await;
            }
            session.serve(server_stdin).await;
            drop(server_stderr);
        });

        Ok(LaunchedProcess {
            stdin: Box::new(client_stdin),
            stdout: Box::new(client_stdout),
            stderr: Some(Box::new(client_stderr)),
            handle: Box::new(MockHandle {
                task,
                stats: Arc::clone(&self.stats),
            }),
        })
    }
}

struct MockSession {
    tools: Vec<MockTool>,
    handshake: MockHandshake,
    call_delay: Duration,
    noisy: bool,
    stats: Arc<MockStats>,
    stdout: tokio::sync::Mutex<DuplexStream>,
}

impl MockSession {
    /// Serve until stdin closes; each request is answered on its own task
    async fn serve(self: Arc<Self>, stdin: DuplexStream) {
        let mut lines = BufReader::new(stdin).lines();
        let mut workers = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(message) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            let method = message["method"].as_str().unwrap_or_default().to_string();
            self.stats.methods.lock().push(method.clone());

            let Some(id) = message.get("id").and_then(Value::as_u64) else {
                continue;
            };
            let session = Arc::clone(&self);
            workers.push(tokio::spawn(async move {
                session.answer(id, &method, &message["params"]).await;
            }));
        }
        for worker in workers {
            let _ = worker.await;
        }
    }

    async fn answer(&self, id: u64, method: &str, params: &Value) {
        let reply = match method {
            "initialize" => match &self.handshake {
                MockHandshake::Accept => Ok(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "mock", "version": "0.0.0" }
                })),
                MockHandshake::Reject(message) => Err((error_codes::INTERNAL_ERROR, message.clone())),
                MockHandshake::Hang => return,
            },
            "tools/list" => Ok(json!({
                "tools": self.tools.iter().map(|tool| json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": { "type": "object" }
                })).collect::<Vec<_>>()
            })),
            "tools/call" => Ok(self.call(params).await),
            other => Err((error_codes::METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        let response = match reply {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message }
            }),
        };

        let mut stdout = self.stdout.lock().await;
        if self.noisy {
            let _ = stdout.write_all(b"[mock] handling request\n").await;
            let stale = json!({ "jsonrpc": "2.0", "id": id + 1000, "result": "stale" });
            let _ = stdout.write_all(format!("{}\n", stale).as_bytes()).await;
        }
        let _ = stdout.write_all(format!("{}\n", response).as_bytes()).await;
        let _ = stdout.flush().await;
    }

    async fn call(&self, params: &Value) -> Value {
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }

        let name = params["name"].as_str().unwrap_or_default();
        let arguments = params["arguments"].as_object().cloned().unwrap_or_default();
        let outcome = match self.tools.iter().find(|tool| tool.name == name) {
            Some(tool) => (tool.handler)(&arguments),
            None => Err(format!("Unknown tool: {}", name)),
        };

        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        match outcome {
            Ok(value) => json!({
                "content": [{ "type": "text", "text": render(&value) }],
                "structuredContent": { "result": value },
                "isError": false
            }),
            Err(message) => json!({
                "content": [{ "type": "text", "text": message }],
                "isError": true
            }),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct MockHandle {
    task: JoinHandle<()>,
    stats: Arc<MockStats>,
}

#[async_trait]
impl ProcessHandle for MockHandle {
    async fn wait(&mut self) -> std::io::Result<()> {
        let _ = (&mut self.task).await;
        Ok(())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.task.abort();
        self.stats.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
