//! Configuration errors

/// Errors raised while building connection descriptors
///
/// All of these surface before any connection attempt is made.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Server name must not be empty")]
    EmptyName,

    #[error("Server '{server}' is missing required field '{field}'")]
    MissingField { server: String, field: &'static str },

    #[error("Server '{server}' has an invalid base URL '{url}': {reason}")]
    InvalidUrl {
        server: String,
        url: String,
        reason: String,
    },

    #[error("Server '{server}' has an invalid timeout: must be greater than zero")]
    InvalidTimeout { server: String },

    #[error("Server '{server}' uses unknown transport '{transport}'")]
    UnknownTransport { server: String, transport: String },

    #[error("Server '{server}' is a {actual} server, expected {expected}")]
    WrongKind {
        server: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Server '{server}' has an invalid entry: {reason}")]
    InvalidEntry { server: String, reason: String },

    #[error("Configuration must be a mapping of server name to settings")]
    NotAMapping,

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
