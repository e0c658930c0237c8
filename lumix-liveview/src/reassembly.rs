//! Frame reassembly from classified datagrams.
//!
//! Without sequence numbers, segments are assembled in arrival order. With
//! them, datagrams that arrive ahead of a gap are held (up to the reorder
//! window) until the gap fills. A gap that outlives the window or the idle
//! timeout is a loss: the partial frame is dropped and assembly resumes at
//! the next frame start.

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::StreamConfig;
use crate::frame::StreamFrame;
use crate::framing::{Framing, Segment};

/// Counters kept by the receive path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Datagrams received
    pub datagrams: u64,
    /// Datagrams without usable image data
    pub unusable: u64,
    /// Datagrams from an unexpected sender
    pub foreign: u64,
    /// Datagrams older than the next expected sequence number
    pub late: u64,
    /// Datagrams presumed lost
    pub lost: u64,
    /// Continuations skipped while waiting for a frame start
    pub skipped: u64,
    /// Partial frames dropped before completion
    pub discarded: u64,
    /// Completed frames that failed validation
    pub invalid: u64,
    /// Frames emitted
    pub frames: u64,
    /// Frames dropped because the consumer was behind
    pub overflowed: u64,
    /// Socket receive errors, transient ones included
    pub receive_errors: u64,
}

struct Partial {
    sequence: Option<u16>,
    data: BytesMut,
}

/// Rebuilds frames from datagrams.
pub struct Reassembler {
    framing: Box<dyn Framing>,
    reorder_window: usize,
    idle_timeout: Duration,
    max_frame_size: usize,
    next_seq: Option<u16>,
    pending: HashMap<u16, Segment>,
    partial: Option<Partial>,
    last_activity: Instant,
    stats: StreamStats,
}

impl Reassembler {
    pub fn new(config: &StreamConfig) -> Self {
        Self::with_framing(Box::new(config.framing.clone()), config)
    }

    pub fn with_framing(framing: Box<dyn Framing>, config: &StreamConfig) -> Self {
        Self {
            framing,
            reorder_window: config.reorder_window,
            idle_timeout: config.idle_timeout,
            max_frame_size: config.max_frame_size,
            next_seq: None,
            pending: HashMap::new(),
            partial: None,
            last_activity: Instant::now(),
            stats: StreamStats::default(),
        }
    }

    /// Feed one datagram; returns the frames it completed, in order
    pub fn push(&mut self, datagram: Bytes, now: Instant) -> Vec<StreamFrame> {
        self.stats.datagrams += 1;
        let mut frames = Vec::new();

        let Some(segment) = self.framing.classify(datagram) else {
            self.stats.unusable += 1;
            return frames;
        };
        self.last_activity = now;

        match segment.sequence {
            Some(seq) => self.accept_sequenced(seq, segment, &mut frames),
            None => self.assemble(segment, &mut frames),
        }
        frames
    }

    /// Abandon a gap or partial frame that has been idle past the timeout.
    ///
    /// Held datagrams are flushed in order; frames they complete are
    /// returned.
    pub fn expire(&mut self, now: Instant) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        if now.saturating_duration_since(self.last_activity) < self.idle_timeout {
            return frames;
        }

        while !self.pending.is_empty() {
            self.skip_gap(&mut frames);
        }
        if self.partial.is_some() {
            self.discard_partial("idle timeout");
        }
        // The camera may restart numbering after a pause
        self.next_seq = None;
        frames
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut StreamStats {
        &mut self.stats
    }

    fn accept_sequenced(&mut self, seq: u16, segment: Segment, frames: &mut Vec<StreamFrame>) {
        let next = *self.next_seq.get_or_insert(seq);
        let ahead = seq.wrapping_sub(next);

        if ahead == 0 {
            self.assemble(segment, frames);
            self.next_seq = Some(next.wrapping_add(1));
            self.drain_pending(frames);
        } else if ahead < 0x8000 {
            trace!(seq, expected = next, "holding out-of-order datagram");
            self.pending.insert(seq, segment);
            while self.pending.len() > self.reorder_window {
                self.skip_gap(frames);
            }
        } else {
            trace!(seq, expected = next, "dropping late datagram");
            self.stats.late += 1;
        }
    }

    fn drain_pending(&mut self, frames: &mut Vec<StreamFrame>) {
        while let Some(next) = self.next_seq {
            let Some(segment) = self.pending.remove(&next) else { break };
            self.assemble(segment, frames);
            self.next_seq = Some(next.wrapping_add(1));
        }
    }

    /// Give up on the current gap and continue at the oldest held datagram
    fn skip_gap(&mut self, frames: &mut Vec<StreamFrame>) {
        let Some(next) = self.next_seq else { return };
        let Some(first) = self
            .pending
            .keys()
            .copied()
            .min_by_key(|seq| seq.wrapping_sub(next))
        else {
            return;
        };

        let missing = first.wrapping_sub(next);
        self.stats.lost += u64::from(missing);
        debug!(from = next, to = first, missing, "sequence gap, resynchronizing");

        if self.partial.is_some() {
            self.discard_partial("datagram lost");
        }
        self.next_seq = Some(first);
        self.drain_pending(frames);
    }

    fn assemble(&mut self, segment: Segment, frames: &mut Vec<StreamFrame>) {
        if segment.starts_frame {
            if self.partial.is_some() {
                self.discard_partial("interrupted by frame start");
            }
            if segment.ends_frame {
                self.finish(segment.sequence, segment.data, frames);
                return;
            }
            self.partial = Some(Partial {
                sequence: segment.sequence,
                data: BytesMut::from(&segment.data[..]),
            });
        } else {
            let Some(partial) = self.partial.as_mut() else {
                self.stats.skipped += 1;
                return;
            };
            partial.data.extend_from_slice(&segment.data);
        }

        let oversized = self
            .partial
            .as_ref()
            .is_some_and(|partial| partial.data.len() > self.max_frame_size);
        if oversized {
            self.discard_partial("exceeds max_frame_size");
            return;
        }

        if segment.ends_frame {
            if let Some(partial) = self.partial.take() {
                self.finish(partial.sequence, partial.data.freeze(), frames);
            }
        }
    }

    fn finish(&mut self, sequence: Option<u16>, data: Bytes, frames: &mut Vec<StreamFrame>) {
        if data.len() > self.max_frame_size || !self.framing.is_complete(&data) {
            debug!(?sequence, len = data.len(), "dropping invalid frame");
            self.stats.invalid += 1;
            return;
        }
        self.stats.frames += 1;
        frames.push(StreamFrame::new(sequence, data));
    }

    fn discard_partial(&mut self, reason: &str) {
        if let Some(partial) = self.partial.take() {
            debug!(sequence = ?partial.sequence, len = partial.data.len(), reason, "discarding partial frame");
            self.stats.discarded += 1;
        }
    }
}

impl std::fmt::Debug for Reassembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reassembler")
            .field("next_seq", &self.next_seq)
            .field("pending", &self.pending.len())
            .field("in_progress", &self.partial.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
