//! Command client configuration

use std::time::Duration;

use crate::error::{CommandError, Result};
use crate::transport::HttpTransport;

/// Configuration for a [`CommandClient`](crate::CommandClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TCP connect timeout for control requests.
    ///
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Time to wait for the camera's reply.
    ///
    /// Default: 10 seconds
    pub read_timeout: Duration,

    /// User-Agent header; the camera only accepts control from known apps.
    ///
    /// Default: `LUMIX Sync`
    pub user_agent: String,

    /// HTTP port of the camera's `cam.cgi`.
    ///
    /// Default: 80
    pub cam_cgi_port: u16,

    /// Name this client announces when it opens a remote session; shown on
    /// the camera's screen.
    ///
    /// Default: `lumix-remote`
    pub device_name: String,

    /// Refuse idle-only commands while the camera reports local operation.
    ///
    /// Default: true
    pub reject_when_busy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            user_agent: "LUMIX Sync".to_string(),
            cam_cgi_port: 80,
            device_name: "lumix-remote".to_string(),
            reject_when_busy: true,
        }
    }
}

impl ClientConfig {
    /// Short timeouts for cameras on the same access point
    pub fn fast() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(4),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(CommandError::InvalidConfig(
                "client timeouts must be greater than 0".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(CommandError::InvalidConfig("user_agent must not be empty".to_string()));
        }
        if self.cam_cgi_port == 0 {
            return Err(CommandError::InvalidConfig("cam_cgi_port must not be 0".to_string()));
        }
        if self.device_name.trim().is_empty() || self.device_name.contains(['&', '=', ',']) {
            return Err(CommandError::InvalidConfig(format!(
                "device_name {:?} must be non-empty without '&', '=' or ','",
                self.device_name
            )));
        }
        Ok(())
    }

    /// Build the HTTP transport described by this configuration
    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new(self.connect_timeout, self.read_timeout, self.user_agent.clone())
    }
}
