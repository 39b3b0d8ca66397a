//! Process launching
//!
//! Spawning is behind [`ProcessLauncher`] so a client can run against a real
//! child process or an in-memory one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use crate::config::SubprocessParams;
use crate::connection::{ConnectionError, ConnectionResult};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to a launched process
#[async_trait]
pub trait ProcessHandle: Send {
    /// Wait for the process to exit
    async fn wait(&mut self) -> std::io::Result<()>;

    /// Kill the process and reap it
    async fn kill(&mut self) -> std::io::Result<()>;

    /// OS process id, when there is one
    fn id(&self) -> Option<u32> {
        None
    }
}

/// Pipes and handle of a freshly launched process
pub struct LaunchedProcess {
    pub stdin: BoxedWriter,
    pub stdout: BoxedReader,
    pub stderr: Option<BoxedReader>,
    pub handle: Box<dyn ProcessHandle>,
}

/// Starts the process behind a subprocess connection
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, params: &SubprocessParams) -> ConnectionResult<LaunchedProcess>;
}

/// Launches real child processes with `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, params: &SubprocessParams) -> ConnectionResult<LaunchedProcess> {
        let program = resolve_command(params)?;

        let mut cmd = Command::new(&program);
        cmd.args(&params.args)
            .envs(&params.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &params.cwd {
            cmd.current_dir(cwd);
        }

        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let spawn_error = |reason: String| ConnectionError::Spawn {
            command: params.command.clone(),
            reason,
        };

        let mut child = cmd.spawn().map_err(|e| spawn_error(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("failed to capture stdout".to_string()))?;
        let stderr = child.stderr.take().map(|s| Box::new(s) as BoxedReader);

        Ok(LaunchedProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr,
            handle: Box::new(ChildHandle(child)),
        })
    }
}

struct ChildHandle(Child);

#[async_trait]
impl ProcessHandle for ChildHandle {
    async fn wait(&mut self) -> std::io::Result<()> {
        self.0.wait().await.map(|_| ())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.0.kill().await
    }

    fn id(&self) -> Option<u32> {
        self.0.id()
    }
}

/// Resolve the program to execute
///
/// Commands containing a path separator are used as given. Bare names such as
/// `npx` or `uvx` are looked up on `PATH`, using the connection's own `PATH`
/// override when it sets one.
pub fn resolve_command(params: &SubprocessParams) -> ConnectionResult<PathBuf> {
    let command = params.command.trim();
    if Path::new(command).components().count() > 1 {
        return Ok(PathBuf::from(command));
    }

    let lookup = match params.env.get("PATH") {
        Some(path) => {
            let cwd = match &params.cwd {
                Some(cwd) => cwd.clone(),
                None => std::env::current_dir()?,
            };
            which::which_in(command, Some(OsString::from(path)), cwd)
        }
        None => which::which(command),
    };

    lookup.map_err(|e| ConnectionError::Spawn {
        command: command.to_string(),
        reason: format!("command not found on PATH: {}", e),
    })
}
