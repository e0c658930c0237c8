use thiserror::Error;

use crate::logging::LoggingError;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Discovery error: {0}")]
    Discovery(#[from] lumix_discovery::DiscoveryError),

    #[error("Command error: {0}")]
    Command(#[from] lumix_control::CommandError),

    #[error("Event error: {0}")]
    Events(#[from] lumix_events::EventError),

    #[error("Live view error: {0}")]
    Stream(#[from] lumix_liveview::StreamError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Live view is already running")]
    LiveViewActive,

    #[error("Live view is not running")]
    LiveViewInactive,

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SdkError>;

impl From<tokio::task::JoinError> for SdkError {
    fn from(error: tokio::task::JoinError) -> Self {
        SdkError::Task(error.to_string())
    }
}
