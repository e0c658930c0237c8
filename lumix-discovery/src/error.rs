//! Error types for the discovery system.

use std::fmt;
use std::time::Duration;

/// Error type for discovery operations.
#[derive(Debug)]
pub enum DiscoveryError {
    /// No matching camera answered before the timeout
    NotFound { timeout: Duration },
    /// A response matched the camera signature but its description
    /// documents could not be fetched or parsed
    MalformedResponse { location: String, reason: String },
    /// Network-related errors (socket creation, HTTP requests, etc.)
    NetworkError(String),
    /// Parsing errors (XML, SSDP response, etc.)
    ParseError(String),
    /// Invalid discovery configuration
    InvalidConfig(String),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::NotFound { timeout } => {
                write!(f, "Camera not found within {:.1}s", timeout.as_secs_f64())
            }
            DiscoveryError::MalformedResponse { location, reason } => {
                write!(f, "Malformed response from {}: {}", location, reason)
            }
            DiscoveryError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DiscoveryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DiscoveryError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
