//! # Lumix Live View
//!
//! Receives the camera's live-view stream over UDP, rebuilds JPEG frames
//! from the datagrams and fans them out to independent consumers.
//!
//! ```text
//! UDP socket ─► Reassembler ─► FrameSource ─► FrameDistributor ─► FrameSubscription (×N)
//! ```
//!
//! Neither stage waits on a consumer. The receive loop drops frames when
//! its [`FrameSource`] is full; the [`FrameDistributor`] disconnects a
//! subscriber whose backlog is full.
//!
//! ```rust,ignore
//! use lumix_liveview::{DistributorConfig, FrameDistributor, StreamConfig, StreamReceiver};
//!
//! let mut source = StreamReceiver::start(StreamConfig::default()).await?;
//! let distributor = FrameDistributor::new(DistributorConfig::default())?;
//! let (_handle, mut viewer) = distributor.attach();
//!
//! tokio::spawn(async move {
//!     while let Some(frame) = source.recv().await {
//!         distributor.publish(frame);
//!     }
//! });
//!
//! while let Some(Ok(frame)) = viewer.recv().await {
//!     println!("frame {:?}: {} bytes", frame.sequence, frame.len());
//! }
//! ```

mod config;
mod distributor;
mod error;
mod frame;
mod framing;
mod reassembly;
mod receiver;

pub use config::{DistributorConfig, StreamConfig, DEFAULT_STREAM_PORT};
pub use distributor::{DistributorStats, FrameDistributor, FrameSubscription, SubscriberHandle, SubscriptionItem};
pub use error::{BackpressureError, Result, StreamError};
pub use frame::StreamFrame;
pub use framing::{Framing, JpegMarkerFraming, Segment, JPEG_EOI, JPEG_SOI};
pub use reassembly::{Reassembler, StreamStats};
pub use receiver::{FrameSource, StreamReceiver};
