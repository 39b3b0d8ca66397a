//! Connection errors

use std::time::Duration;

/// Errors raised by a single tool connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection '{0}' is not initialized")]
    NotInitialized(String),

    #[error("Failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Connection closed")]
    Closed,
}

impl From<reqwest::Error> for ConnectionError {
    fn from(err: reqwest::Error) -> Self {
        ConnectionError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        ConnectionError::Transport(err.to_string())
    }
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;
