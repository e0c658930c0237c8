//! Live-view configuration

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Result, StreamError};
use crate::framing::JpegMarkerFraming;

/// Default UDP port the camera streams to
pub const DEFAULT_STREAM_PORT: u16 = 49152;

/// Configuration for a [`StreamReceiver`](crate::StreamReceiver).
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Local address the UDP socket binds to
    /// Default: 0.0.0.0:49152
    pub bind_address: SocketAddr,

    /// Only accept datagrams from this address
    /// Default: None
    pub expected_sender: Option<IpAddr>,

    /// How datagrams are split into frame segments
    /// Default: JPEG markers, no sequence number, no continuation header
    pub framing: JpegMarkerFraming,

    /// Out-of-order datagrams held while waiting for a missing one
    /// Default: 4
    pub reorder_window: usize,

    /// A partial frame or sequence gap older than this is abandoned
    /// Default: 500 milliseconds
    pub idle_timeout: Duration,

    /// Largest frame accepted, in bytes
    /// Default: 2 MiB
    pub max_frame_size: usize,

    /// Frames buffered between the receive loop and the consumer; frames
    /// beyond this are dropped, never waited for
    /// Default: 8
    pub source_capacity: usize,

    /// Receive buffer, the largest datagram accepted
    /// Default: 65535
    pub max_datagram_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_STREAM_PORT),
            expected_sender: None,
            framing: JpegMarkerFraming::default(),
            reorder_window: 4,
            idle_timeout: Duration::from_millis(500),
            max_frame_size: 2 * 1024 * 1024,
            source_capacity: 8,
            max_datagram_size: 65535,
        }
    }
}

impl StreamConfig {
    /// Default configuration bound to `bind_address`
    pub fn bind(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            return Err(StreamError::InvalidConfig(
                "idle_timeout must be greater than 0".to_string(),
            ));
        }

        if self.source_capacity == 0 {
            return Err(StreamError::InvalidConfig(
                "source_capacity must be greater than 0".to_string(),
            ));
        }

        if self.max_datagram_size == 0 {
            return Err(StreamError::InvalidConfig(
                "max_datagram_size must be greater than 0".to_string(),
            ));
        }

        // Smallest image: start marker followed by end marker
        if self.max_frame_size < 5 {
            return Err(StreamError::InvalidConfig(
                "max_frame_size must be at least 5 bytes".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for a [`FrameDistributor`](crate::FrameDistributor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    /// Frames queued per subscriber before it is disconnected
    /// Default: 16
    pub backlog: usize,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self { backlog: 16 }
    }
}

impl DistributorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backlog == 0 {
            return Err(StreamError::InvalidConfig(
                "backlog must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
