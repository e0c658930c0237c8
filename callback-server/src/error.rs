use thiserror::Error;

/// Errors raised while starting or stopping the callback server
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("No available port found in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("Failed to detect local IP address")]
    LocalAddressUnavailable,

    #[error("Callback server failed to start")]
    StartupFailed,
}
