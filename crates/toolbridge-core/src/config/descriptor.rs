//! Connection descriptors
//!
//! A [`ConnectionDescriptor`] is the validated, transport-specific recipe for
//! one connection. Construction is the only place validation happens.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use crate::types::TransportKind;

/// Default request timeout for network connections
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire style of a network connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkStyle {
    /// REST-ish path cascade with a JSON-RPC fallback
    PlainHttp,
    /// Server-sent events, handled by a delegated adapter
    Sse,
    /// Streamable HTTP, handled by a delegated adapter
    Streamable,
}

impl NetworkStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkStyle::PlainHttp => "plain-http",
            NetworkStyle::Sse => "sse",
            NetworkStyle::Streamable => "streamable",
        }
    }

    /// Whether the connection is handed to a delegated adapter
    pub fn is_delegated(&self) -> bool {
        !matches!(self, NetworkStyle::PlainHttp)
    }
}

impl fmt::Display for NetworkStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for a subprocess connection
#[derive(Debug, Clone, PartialEq)]
pub struct SubprocessParams {
    pub command: String,
    pub args: Vec<String>,
    /// Merged onto the inherited process environment
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl SubprocessParams {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Settings for a network connection
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkParams {
    pub style: NetworkStyle,
    pub base_url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
    pub tls_verify: bool,
}

impl NetworkParams {
    pub fn new(style: NetworkStyle, base_url: impl Into<String>) -> Self {
        Self {
            style,
            base_url: base_url.into(),
            headers: HashMap::new(),
            timeout: DEFAULT_NETWORK_TIMEOUT,
            tls_verify: true,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Base URL with any trailing `/` removed, ready for path joins
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Join a path such as `/tools` onto the base URL, keeping any path prefix
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.trimmed_base_url(), path)
    }

    /// Bearer token carried by an `Authorization` header, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.strip_prefix("Bearer ").unwrap_or(value).trim())
    }
}

/// Transport-specific part of a descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum TransportParams {
    Subprocess(SubprocessParams),
    Network(NetworkParams),
}

impl TransportParams {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportParams::Subprocess(_) => TransportKind::Subprocess,
            TransportParams::Network(_) => TransportKind::Network,
        }
    }
}

/// Validated description of one connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDescriptor {
    name: String,
    transport: TransportParams,
}

impl ConnectionDescriptor {
    /// Validate and build a descriptor
    pub fn new(name: impl Into<String>, transport: TransportParams) -> ConfigResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        match &transport {
            TransportParams::Subprocess(params) => validate_subprocess(&name, params)?,
            TransportParams::Network(params) => validate_network(&name, params)?,
        }
        Ok(Self { name, transport })
    }

    pub fn subprocess(name: impl Into<String>, params: SubprocessParams) -> ConfigResult<Self> {
        Self::new(name, TransportParams::Subprocess(params))
    }

    pub fn network(name: impl Into<String>, params: NetworkParams) -> ConfigResult<Self> {
        Self::new(name, TransportParams::Network(params))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn transport(&self) -> &TransportParams {
        &self.transport
    }

    pub fn as_subprocess(&self) -> Option<&SubprocessParams> {
        match &self.transport {
            TransportParams::Subprocess(params) => Some(params),
            TransportParams::Network(_) => None,
        }
    }

    pub fn as_network(&self) -> Option<&NetworkParams> {
        match &self.transport {
            TransportParams::Network(params) => Some(params),
            TransportParams::Subprocess(_) => None,
        }
    }

    /// Fail with [`ConfigError::WrongKind`] unless this descriptor is of `expected` kind
    pub fn expect_kind(&self, expected: TransportKind) -> ConfigResult<()> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(ConfigError::WrongKind {
                server: self.name.clone(),
                expected: expected.as_str(),
                actual: self.kind().as_str(),
            })
        }
    }
}

fn validate_subprocess(name: &str, params: &SubprocessParams) -> ConfigResult<()> {
    if params.command.trim().is_empty() {
        return Err(ConfigError::MissingField {
            server: name.to_string(),
            field: "command",
        });
    }
    Ok(())
}

fn validate_network(name: &str, params: &NetworkParams) -> ConfigResult<()> {
    if params.base_url.trim().is_empty() {
        return Err(ConfigError::MissingField {
            server: name.to_string(),
            field: "url",
        });
    }

    let invalid = |reason: String| ConfigError::InvalidUrl {
        server: name.to_string(),
        url: params.base_url.clone(),
        reason,
    };
    let url = Url::parse(&params.base_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    if params.timeout.is_zero() {
        return Err(ConfigError::InvalidTimeout {
            server: name.to_string(),
        });
    }
    Ok(())
}
