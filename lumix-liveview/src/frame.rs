use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One reassembled live-view image.
///
/// Immutable once built. `data` always starts with the JPEG start-of-image
/// marker and ends with the end-of-image marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// Transport sequence number of the first datagram, when the stream
    /// carries one
    pub sequence: Option<u16>,
    pub data: Bytes,
    /// When the last datagram of the frame arrived
    pub received_at: DateTime<Utc>,
}

impl StreamFrame {
    pub fn new(sequence: Option<u16>, data: Bytes) -> Self {
        Self {
            sequence,
            data,
            received_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
