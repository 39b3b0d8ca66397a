//! Where a tool comes from

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Transport family of a tool-provider connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Child process speaking line-delimited JSON-RPC over stdio
    Subprocess,
    /// Remote HTTP/SSE service
    Network,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Subprocess => "subprocess",
            TransportKind::Network => "network",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a registered tool, used for grouping in summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Local,
    Subprocess,
    Network,
}

impl From<TransportKind> for ToolCategory {
    fn from(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Subprocess => ToolCategory::Subprocess,
            TransportKind::Network => ToolCategory::Network,
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolCategory::Local => "local",
            ToolCategory::Subprocess => "subprocess",
            ToolCategory::Network => "network",
        })
    }
}

/// Origin of a tool: `local`, or `{kind}:{connection}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolSource {
    Local,
    Connection {
        kind: TransportKind,
        connection: String,
    },
}

impl ToolSource {
    pub fn local() -> Self {
        ToolSource::Local
    }

    pub fn connection(kind: TransportKind, connection: impl Into<String>) -> Self {
        ToolSource::Connection {
            kind,
            connection: connection.into(),
        }
    }

    pub fn category(&self) -> ToolCategory {
        match self {
            ToolSource::Local => ToolCategory::Local,
            ToolSource::Connection { kind, .. } => (*kind).into(),
        }
    }

    /// Name of the owning connection, `None` for local tools
    pub fn connection_name(&self) -> Option<&str> {
        match self {
            ToolSource::Local => None,
            ToolSource::Connection { connection, .. } => Some(connection),
        }
    }
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolSource::Local => f.write_str("local"),
            ToolSource::Connection { kind, connection } => write!(f, "{}:{}", kind, connection),
        }
    }
}

impl FromStr for ToolSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "local" {
            return Ok(ToolSource::Local);
        }
        let (kind, connection) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid tool source '{}'", s))?;
        let kind = match kind {
            "subprocess" => TransportKind::Subprocess,
            "network" => TransportKind::Network,
            other => return Err(format!("unknown transport kind '{}'", other)),
        };
        if connection.is_empty() {
            return Err(format!("tool source '{}' has no connection name", s));
        }
        Ok(ToolSource::connection(kind, connection))
    }
}

impl Serialize for ToolSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ToolSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
