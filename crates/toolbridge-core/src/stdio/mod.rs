//! Subprocess transport
//!
//! Tool servers started as child processes, speaking newline-delimited
//! JSON-RPC on stdin/stdout.

mod launcher;
mod transport;
mod client;
pub mod mock;

pub use launcher::{
    resolve_command, BoxedReader, BoxedWriter, CommandLauncher, LaunchedProcess, ProcessHandle,
    ProcessLauncher,
};
pub use transport::LineTransport;
pub use client::{
    SubprocessClient, DEFAULT_CALL_TIMEOUT, DEFAULT_INIT_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT,
    PROTOCOL_VERSION,
};
pub use mock::{MockHandshake, MockServer, MockStats, MockTool};
