//! # Lumix SDK - remote control for Panasonic Lumix cameras
//!
//! Ties the layers together behind [`LumixCamera`]:
//!
//! ```rust,no_run
//! use lumix_sdk::{catalog, CameraConfig, LumixCamera};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lumix_sdk::SdkError> {
//!     lumix_sdk::logging::init_logging_from_env()?;
//!
//!     let config = CameraConfig::load_default()?;
//!     let mut camera = tokio::task::spawn_blocking(move || LumixCamera::discover(config)).await??;
//!
//!     camera.invoke_async(catalog::set_mode(catalog::CameraMode::Rec)).await?;
//!     camera.invoke_async(catalog::focus_step(catalog::FocusStep::TeleFast)).await?;
//!     println!("focus is now {:?}", camera.state().get_i64("focus-position"));
//!
//!     let mut events = camera.subscribe_events().await?;
//!     while let Some(Ok(notification)) = events.next().await {
//!         println!("{} properties changed", notification.properties.len());
//!     }
//!
//!     camera.shutdown().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! lumix-sdk (LumixCamera, CameraConfig, logging)
//!     ├── lumix-discovery   SSDP search, device and service descriptions
//!     ├── lumix-control     cam.cgi session and commands, SOAP actions
//!     ├── lumix-events      GENA subscriptions over callback-server
//!     ├── lumix-liveview    UDP receive, frame reassembly, fan-out
//!     └── lumix-state       shared StateCache with revisions
//! ```
//!
//! ## Logging
//!
//! Nothing is printed unless a subscriber is installed; see [`logging`].
//! `LUMIX_LOG_MODE=development` and `LUMIX_LOG_LEVEL=lumix_events=debug`
//! are a good start when a camera misbehaves.

mod camera;
mod config;
mod error;
pub mod logging;

pub use camera::LumixCamera;
pub use config::CameraConfig;
pub use error::{Result, SdkError};

pub use lumix_control::{catalog, ClientConfig, Command, CommandError, CommandOutcome, EffectSource, Reply};
pub use lumix_discovery::{DeviceDescriptor, DiscoveryConfig, DiscoveryError};
pub use lumix_events::{EventConfig, EventError, EventItem, EventStream, Notification};
pub use lumix_liveview::{
    BackpressureError, DistributorConfig, FrameSubscription, JpegMarkerFraming, StreamConfig, StreamError,
    StreamFrame, StreamStats, SubscriberHandle, DEFAULT_STREAM_PORT,
};
pub use lumix_state::{keys, CameraState, ChangeEvent, PropertyValue, StateCache};
