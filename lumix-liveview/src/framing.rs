//! Datagram classification.
//!
//! A [`Framing`] turns one raw datagram into a [`Segment`]: the image bytes
//! it carries, whether it opens or closes a frame, and the transport
//! sequence number if the stream has one. Reassembly only ever looks at
//! segments, so other camera dialects can plug in their own framing.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// JPEG start-of-image marker, including the first byte of the next marker
pub const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// JPEG end-of-image marker
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Image bytes carried by one datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub sequence: Option<u16>,
    pub starts_frame: bool,
    pub ends_frame: bool,
    pub data: Bytes,
}

/// Splits datagrams into frame segments.
pub trait Framing: Send + Sync {
    /// Classify one datagram; `None` if it carries no usable image data
    fn classify(&self, datagram: Bytes) -> Option<Segment>;

    /// Whether a reassembled frame is a complete image
    fn is_complete(&self, frame: &[u8]) -> bool;
}

/// Framing by JPEG markers.
///
/// A datagram containing the start-of-image marker opens a frame; everything
/// before the marker is camera header and is dropped. Other datagrams are
/// continuations with a fixed-size header. A segment whose data ends with the
/// end-of-image marker closes the frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JpegMarkerFraming {
    /// Offset of a big-endian u16 sequence number in every datagram
    /// Default: None
    pub sequence_offset: Option<usize>,

    /// Header bytes stripped from continuation datagrams
    /// Default: 0
    pub continuation_header: usize,
}

impl JpegMarkerFraming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence_offset(mut self, offset: usize) -> Self {
        self.sequence_offset = Some(offset);
        self
    }

    pub fn with_continuation_header(mut self, len: usize) -> Self {
        self.continuation_header = len;
        self
    }

    fn sequence(&self, datagram: &[u8]) -> Option<Option<u16>> {
        match self.sequence_offset {
            None => Some(None),
            Some(offset) => {
                let bytes = datagram.get(offset..offset + 2)?;
                Some(Some(u16::from_be_bytes([bytes[0], bytes[1]])))
            }
        }
    }
}

impl Framing for JpegMarkerFraming {
    fn classify(&self, datagram: Bytes) -> Option<Segment> {
        // Datagrams too short for the sequence field are unusable
        let sequence = self.sequence(&datagram)?;

        // The marker is searched for past the sequence field
        let search_from = self.sequence_offset.map_or(0, |offset| offset + 2);
        let marker = datagram
            .get(search_from..)
            .and_then(|tail| find(tail, &JPEG_SOI))
            .map(|position| search_from + position);

        let (starts_frame, data) = match marker {
            Some(start) => (true, datagram.slice(start..)),
            None if datagram.len() > self.continuation_header => {
                (false, datagram.slice(self.continuation_header..))
            }
            None => return None,
        };

        Some(Segment {
            sequence,
            starts_frame,
            ends_frame: data.ends_with(&JPEG_EOI),
            data,
        })
    }

    fn is_complete(&self, frame: &[u8]) -> bool {
        frame.len() >= JPEG_SOI.len() + JPEG_EOI.len()
            && frame.starts_with(&JPEG_SOI)
            && frame.ends_with(&JPEG_EOI)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
