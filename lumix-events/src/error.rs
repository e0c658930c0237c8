use callback_server::CallbackError;
use soap_client::SoapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    /// The subscription ended: lease lost or callback listener gone
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// The initial SUBSCRIBE was refused or failed
    #[error("Subscription failed: {0}")]
    SubscribeFailed(String),

    /// The camera does not advertise an event subscription URL
    #[error("No event service advertised by {0}")]
    NoEventService(String),

    /// The callback listener could not be started
    #[error("Callback listener error: {0}")]
    Listener(#[from] CallbackError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EventError>;

impl From<SoapError> for EventError {
    fn from(error: SoapError) -> Self {
        EventError::SubscribeFailed(error.to_string())
    }
}
