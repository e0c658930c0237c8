//! Camera configuration
//!
//! [`CameraConfig`] collects the settings of every layer in one
//! serde-friendly struct. Durations are stored as milliseconds so the JSON
//! form stays flat:
//!
//! ```json
//! {
//!   "discovery_timeout_ms": 5000,
//!   "reject_when_busy": false,
//!   "callback_port_range": [49153, 49160],
//!   "reorder_window": 8,
//!   "distributor": { "backlog": 32 }
//! }
//! ```
//!
//! Missing fields take their defaults.

use lumix_control::ClientConfig;
use lumix_discovery::DiscoveryConfig;
use lumix_events::EventConfig;
use lumix_liveview::{DistributorConfig, JpegMarkerFraming, StreamConfig};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SdkError};

/// Directory under the platform config dir holding `config.json`
const CONFIG_DIR: &str = "lumix-remote";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// SSDP search window
    /// Default: 3000
    pub discovery_timeout_ms: u64,

    /// Timeout for fetching description documents
    /// Default: 5000
    pub fetch_timeout_ms: u64,

    /// Control request connect timeout
    /// Default: 5000
    pub connect_timeout_ms: u64,

    /// Control request reply timeout
    /// Default: 10000
    pub read_timeout_ms: u64,

    /// Default: "LUMIX Sync"
    pub user_agent: String,

    /// HTTP port of the camera's `cam.cgi`
    /// Default: 80
    pub cam_cgi_port: u16,

    /// Name shown on the camera while this client holds the session
    /// Default: "lumix-remote"
    pub device_name: String,

    /// Interval between `getstate` requests that keep the session alive; 0 disables
    /// Default: 2000
    pub keepalive_interval_ms: u64,

    /// Refuse idle-only commands while the camera is operated locally
    /// Default: true
    pub reject_when_busy: bool,

    /// Default: (49153, 49200)
    pub callback_port_range: (u16, u16),

    /// Default: "/Camera/event"
    pub callback_path: String,

    /// Lease requested for event subscriptions
    /// Default: 300
    pub lease_secs: u64,

    /// Default: 0.5
    pub renewal_fraction: f64,

    /// Default: 2000
    pub retry_backoff_base_ms: u64,

    /// Default: 30000
    pub retry_backoff_max_ms: u64,

    /// Drop notifications and datagrams that do not come from the camera
    /// Default: true
    pub verify_sender: bool,

    /// Live-view datagram layout
    pub framing: JpegMarkerFraming,

    /// Default: 4
    pub reorder_window: usize,

    /// Default: 500
    pub idle_timeout_ms: u64,

    /// Default: 2 MiB
    pub max_frame_size: usize,

    /// Default: 8
    pub source_capacity: usize,

    pub distributor: DistributorConfig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        let events = EventConfig::default();
        let stream = StreamConfig::default();
        let discovery = DiscoveryConfig::default();

        Self {
            discovery_timeout_ms: millis(discovery.timeout),
            fetch_timeout_ms: millis(discovery.fetch_timeout),
            connect_timeout_ms: millis(client.connect_timeout),
            read_timeout_ms: millis(client.read_timeout),
            user_agent: client.user_agent,
            cam_cgi_port: client.cam_cgi_port,
            device_name: client.device_name,
            keepalive_interval_ms: 2000,
            reject_when_busy: client.reject_when_busy,
            callback_port_range: events.callback_port_range,
            callback_path: events.callback_path,
            lease_secs: events.requested_lease.as_secs(),
            renewal_fraction: events.renewal_fraction,
            retry_backoff_base_ms: millis(events.retry_backoff_base),
            retry_backoff_max_ms: millis(events.retry_backoff_max),
            verify_sender: events.verify_sender,
            framing: stream.framing,
            reorder_window: stream.reorder_window,
            idle_timeout_ms: millis(stream.idle_timeout),
            max_frame_size: stream.max_frame_size,
            source_capacity: stream.source_capacity,
            distributor: DistributorConfig::default(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl CameraConfig {
    /// Parse a JSON document; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SdkError::Config(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// `<config dir>/lumix-remote/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from [`default_path`](Self::default_path), or defaults when no file exists
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "loading camera configuration");
                Self::from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Validate by building every layer's configuration
    pub fn validate(&self) -> Result<()> {
        self.discovery_config().validate()?;
        self.client_config().validate()?;
        self.event_config(None).validate()?;
        self.stream_config(SocketAddr::from(([0, 0, 0, 0], 0)), None).validate()?;
        self.distributor.validate()?;
        Ok(())
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            timeout: Duration::from_millis(self.discovery_timeout_ms),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            ..DiscoveryConfig::default()
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            user_agent: self.user_agent.clone(),
            cam_cgi_port: self.cam_cgi_port,
            device_name: self.device_name.clone(),
            reject_when_busy: self.reject_when_busy,
        }
    }

    /// `None` when keepalive is disabled
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_ms > 0).then(|| Duration::from_millis(self.keepalive_interval_ms))
    }

    /// Event configuration routing callbacks towards `route_hint`
    pub fn event_config(&self, route_hint: Option<IpAddr>) -> EventConfig {
        EventConfig {
            callback_port_range: self.callback_port_range,
            callback_path: self.callback_path.clone(),
            route_hint,
            requested_lease: Duration::from_secs(self.lease_secs),
            renewal_fraction: self.renewal_fraction,
            retry_backoff_base: Duration::from_millis(self.retry_backoff_base_ms),
            retry_backoff_max: Duration::from_millis(self.retry_backoff_max_ms),
            verify_sender: self.verify_sender,
        }
    }

    /// Stream configuration for a socket on `bind`, accepting `camera` only
    /// when sender verification is on
    pub fn stream_config(&self, bind: SocketAddr, camera: Option<IpAddr>) -> StreamConfig {
        StreamConfig {
            bind_address: bind,
            expected_sender: camera.filter(|_| self.verify_sender),
            framing: self.framing.clone(),
            reorder_window: self.reorder_window,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            max_frame_size: self.max_frame_size,
            source_capacity: self.source_capacity,
            ..StreamConfig::default()
        }
    }
}
