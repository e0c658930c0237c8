//! Event subscription configuration

use callback_server::ServerConfig;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::{EventError, Result};

/// Configuration for an [`EventSubscriber`](crate::EventSubscriber).
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Port range for the callback listener (start, end)
    /// Default: (49153, 49200)
    pub callback_port_range: (u16, u16),

    /// Path advertised in the CALLBACK header
    /// Default: "/Camera/event"
    pub callback_path: String,

    /// Address used to choose the local interface for the callback URL.
    /// Usually the camera's own address.
    /// Default: None
    pub route_hint: Option<IpAddr>,

    /// Lease requested in SUBSCRIBE; the camera may grant a different one
    /// Default: 300 seconds
    pub requested_lease: Duration,

    /// Fraction of the remaining lease after which renewal is attempted
    /// Default: 0.5
    pub renewal_fraction: f64,

    /// Base delay between failed renewal attempts, doubled per attempt
    /// Default: 2 seconds
    pub retry_backoff_base: Duration,

    /// Upper bound for the renewal retry delay
    /// Default: 30 seconds
    pub retry_backoff_max: Duration,

    /// Drop notifications whose peer is not the camera
    /// Default: true
    pub verify_sender: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            callback_port_range: (49153, 49200),
            callback_path: "/Camera/event".to_string(),
            route_hint: None,
            requested_lease: Duration::from_secs(300),
            renewal_fraction: 0.5,
            retry_backoff_base: Duration::from_secs(2),
            retry_backoff_max: Duration::from_secs(30),
            verify_sender: true,
        }
    }
}

impl EventConfig {
    pub fn validate(&self) -> Result<()> {
        let (start, end) = self.callback_port_range;
        if start == 0 || start > end {
            return Err(EventError::InvalidConfig(format!(
                "callback_port_range {}-{} is empty",
                start, end
            )));
        }

        if self.requested_lease < Duration::from_secs(1) {
            return Err(EventError::InvalidConfig(
                "requested_lease must be at least 1 second".to_string(),
            ));
        }

        if !(self.renewal_fraction > 0.0 && self.renewal_fraction < 1.0) {
            return Err(EventError::InvalidConfig(
                "renewal_fraction must be between 0 and 1".to_string(),
            ));
        }

        if self.retry_backoff_base.is_zero() || self.retry_backoff_max < self.retry_backoff_base {
            return Err(EventError::InvalidConfig(
                "retry_backoff_max must be at least retry_backoff_base".to_string(),
            ));
        }

        Ok(())
    }

    pub(crate) fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port_range: self.callback_port_range,
            callback_path: self.callback_path.clone(),
            route_hint: self.route_hint,
        }
    }

    /// Delay before the given failed renewal attempt (1-based)
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_backoff_base
            .saturating_mul(factor)
            .min(self.retry_backoff_max)
    }
}
