use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to bind live-view socket on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket failed in a way retrying cannot fix
    #[error("Live-view socket failed ({kind:?}): {message}")]
    Receive {
        kind: std::io::ErrorKind,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Final item of a subscription that fell too far behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Subscriber disconnected after its backlog of {backlog} frames filled up")]
pub struct BackpressureError {
    pub backlog: usize,
}
