use thiserror::Error;

use crate::config::ConfigError;
use crate::studio::StudioError;

/// Errors from hub construction and bring-up
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Tool hub has already been started")]
    AlreadyStarted,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Studio error: {0}")]
    Studio(#[from] StudioError),
}

pub type HubResult<T> = Result<T, HubError>;
