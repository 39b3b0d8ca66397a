//! Server mapping parser
//!
//! Accepts the usual `mcpServers` layout (as JSON, YAML or an already parsed
//! value) and turns each entry into a [`ConnectionDescriptor`].
//!
//! ```
//! use toolbridge_core::config::ServersConfig;
//! use toolbridge_core::types::TransportKind;
//!
//! let config = ServersConfig::from_json_str(r#"{
//!     "mcpServers": {
//!         "fs": { "command": "npx", "args": ["-y", "@modelcontextprotocol/server-filesystem", "."] },
//!         "calc": { "transport": "http", "url": "http://localhost:8080" }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.len(), 2);
//! assert_eq!(config.descriptors(TransportKind::Network).unwrap()[0].name(), "calc");
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::descriptor::{
    ConnectionDescriptor, NetworkParams, NetworkStyle, SubprocessParams, DEFAULT_NETWORK_TIMEOUT,
};
use super::error::{ConfigError, ConfigResult};
use crate::types::TransportKind;

/// Keys under which the server mapping may be nested
const NESTING_KEYS: [&str; 2] = ["mcpServers", "servers"];

/// Resolved transport of a config entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTransport {
    Subprocess,
    Network(NetworkStyle),
}

impl EntryTransport {
    /// Map a config spelling onto a transport; missing means `stdio`
    pub fn parse(spelling: Option<&str>) -> Option<Self> {
        let spelling = spelling.map(|s| s.trim().to_ascii_lowercase());
        match spelling.as_deref() {
            None | Some("") | Some("stdio") | Some("subprocess") => Some(EntryTransport::Subprocess),
            Some("http") | Some("plain-http") | Some("plain_http") => {
                Some(EntryTransport::Network(NetworkStyle::PlainHttp))
            }
            Some("sse") => Some(EntryTransport::Network(NetworkStyle::Sse)),
            Some("streamable_http") | Some("streamable-http") | Some("streamable") => {
                Some(EntryTransport::Network(NetworkStyle::Streamable))
            }
            Some(_) => None,
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            EntryTransport::Subprocess => TransportKind::Subprocess,
            EntryTransport::Network(_) => TransportKind::Network,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawEntry {
    #[serde(default)]
    transport: Option<String>,

    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    cwd: Option<PathBuf>,

    #[serde(default, alias = "url", alias = "baseUrl")]
    base_url: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    /// Seconds
    #[serde(default)]
    timeout: Option<f64>,
    #[serde(default, alias = "ssl_verify", alias = "tlsVerify")]
    tls_verify: Option<bool>,
}

/// One named entry of the server mapping
#[derive(Debug, Clone)]
pub struct ServerEntry {
    name: String,
    transport: EntryTransport,
    raw: RawEntry,
}

impl ServerEntry {
    fn parse(name: &str, value: &Value) -> ConfigResult<Self> {
        let raw: RawEntry =
            serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidEntry {
                server: name.to_string(),
                reason: e.to_string(),
            })?;
        let transport = EntryTransport::parse(raw.transport.as_deref()).ok_or_else(|| {
            ConfigError::UnknownTransport {
                server: name.to_string(),
                transport: raw.transport.clone().unwrap_or_default(),
            }
        })?;
        Ok(Self {
            name: name.to_string(),
            transport,
            raw,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> EntryTransport {
        self.transport
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Validate the entry and build its descriptor
    pub fn to_descriptor(&self) -> ConfigResult<ConnectionDescriptor> {
        match self.transport {
            EntryTransport::Subprocess => {
                let command = self.raw.command.clone().ok_or_else(|| ConfigError::MissingField {
                    server: self.name.clone(),
                    field: "command",
                })?;
                let params = SubprocessParams {
                    command,
                    args: self.raw.args.clone(),
                    env: self.raw.env.clone(),
                    cwd: self.raw.cwd.clone(),
                };
                ConnectionDescriptor::subprocess(self.name.clone(), params)
            }
            EntryTransport::Network(style) => {
                let base_url = self.raw.base_url.clone().ok_or_else(|| ConfigError::MissingField {
                    server: self.name.clone(),
                    field: "url",
                })?;
                let timeout = match self.raw.timeout {
                    None => DEFAULT_NETWORK_TIMEOUT,
                    Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs).map_err(|_| {
                        ConfigError::InvalidTimeout {
                            server: self.name.clone(),
                        }
                    })?,
                    Some(_) => {
                        return Err(ConfigError::InvalidTimeout {
                            server: self.name.clone(),
                        })
                    }
                };
                let params = NetworkParams {
                    style,
                    base_url,
                    headers: self.raw.headers.clone(),
                    timeout,
                    tls_verify: self.raw.tls_verify.unwrap_or(true),
                };
                ConnectionDescriptor::network(self.name.clone(), params)
            }
        }
    }
}

/// Ordered server mapping
#[derive(Debug, Clone, Default)]
pub struct ServersConfig {
    entries: Vec<ServerEntry>,
}

impl ServersConfig {
    /// Parse an already deserialized mapping, optionally nested under
    /// `mcpServers` or `servers`
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        let root = value.as_object().ok_or(ConfigError::NotAMapping)?;
        let servers = NESTING_KEYS
            .iter()
            .find_map(|key| root.get(*key))
            .map(|nested| nested.as_object().ok_or(ConfigError::NotAMapping))
            .transpose()?
            .unwrap_or(root);

        let entries = servers
            .iter()
            .map(|(name, entry)| ServerEntry::parse(name, entry))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn from_json_str(input: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(&value)
    }

    pub fn from_yaml_str(input: &str) -> ConfigResult<Self> {
        let value: Value = serde_yaml::from_str(input)?;
        Self::from_value(&value)
    }

    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one transport kind, in config order
    pub fn entries_of(&self, kind: TransportKind) -> impl Iterator<Item = &ServerEntry> {
        self.entries.iter().filter(move |entry| entry.kind() == kind)
    }

    /// Descriptors of one transport kind; the first invalid entry fails the lot
    pub fn descriptors(&self, kind: TransportKind) -> ConfigResult<Vec<ConnectionDescriptor>> {
        self.entries_of(kind).map(ServerEntry::to_descriptor).collect()
    }
}
