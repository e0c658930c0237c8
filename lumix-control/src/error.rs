use soap_client::SoapError;
use thiserror::Error;

/// Errors returned by [`CommandClient::invoke`](crate::CommandClient::invoke).
///
/// `UnsupportedCommand`, `InvalidArguments`, `CameraBusy` and `NotConnected`
/// are raised before any network traffic. The rest describe how the
/// exchange failed.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The camera did not declare this action
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    /// Argument count differs from the action's declared in-arguments
    #[error("Invalid arguments for {command}: expected {expected}, got {actual}")]
    InvalidArguments {
        command: String,
        expected: usize,
        actual: usize,
    },

    /// The camera reported that it is being operated locally
    #[error("Camera is busy, {0} rejected")]
    CameraBusy(String),

    /// A `cam.cgi` command was issued before a remote session was opened
    #[error("No remote session open, {0} not sent")]
    NotConnected(String),

    /// Network failure (timeout, connection reset, unexpected HTTP status)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The camera answered with a UPnP fault
    #[error("Device error: code {code}")]
    Device { code: u16 },

    /// The camera answered `err_busy`
    #[error("Camera answered busy to {0}")]
    DeviceBusy(String),

    /// The camera answered `err_param`
    #[error("Camera refused the parameters of {0}")]
    InvalidParameter(String),

    /// The camera answered `err_reject`: not possible in its current state
    #[error("Camera rejected {0} in its current state")]
    Rejected(String),

    /// Any other failure result of a `cam.cgi` reply
    #[error("Camera answered {status} to {command}")]
    DeviceStatus { command: String, status: String },

    /// The reply could not be decoded into the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CommandError>;

impl CommandError {
    /// Error for a failure result the camera reported to `command`
    pub(crate) fn from_status(command: &str, status: &str) -> Self {
        let command = command.to_string();
        match status {
            "err_busy" => CommandError::DeviceBusy(command),
            "err_param" => CommandError::InvalidParameter(command),
            "err_reject" => CommandError::Rejected(command),
            _ => CommandError::DeviceStatus {
                command,
                status: status.to_string(),
            },
        }
    }

    /// Whether the camera itself reported the failure
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            CommandError::Device { .. }
                | CommandError::DeviceBusy(_)
                | CommandError::InvalidParameter(_)
                | CommandError::Rejected(_)
                | CommandError::DeviceStatus { .. }
        )
    }
}

impl From<SoapError> for CommandError {
    fn from(error: SoapError) -> Self {
        match error {
            SoapError::Network(msg) => CommandError::Transport(msg),
            SoapError::Parse(msg) => CommandError::MalformedResponse(msg),
            SoapError::Fault(code) => CommandError::Device { code },
        }
    }
}
