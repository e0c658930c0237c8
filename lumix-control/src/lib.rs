//! Command client for Lumix cameras
//!
//! Sends remote-control commands to a discovered camera and folds the
//! properties each reply reports into the shared
//! [`StateCache`](lumix_state::StateCache). The [`catalog`] speaks the
//! camera's `cam.cgi` interface inside a remote session; actions the camera
//! declares in its UPnP service descriptions go out as SOAP requests.
//!
//! ```rust,ignore
//! use lumix_control::{catalog, ClientConfig, CommandClient};
//! use lumix_state::StateCache;
//! use std::sync::Arc;
//!
//! let camera = Arc::new(lumix_discovery::discover(Duration::from_secs(3))?);
//! let state = Arc::new(StateCache::new());
//! let client = CommandClient::new(camera, Arc::clone(&state), &ClientConfig::default())?;
//!
//! client.open_session("my-laptop")?;
//! client.invoke(&catalog::set_mode(catalog::CameraMode::Rec))?;
//! client.invoke(&catalog::focus_step(catalog::FocusStep::TeleFast))?;
//! println!("focus at {:?}", state.get().get_i64("focus-position"));
//! ```

mod camcgi;
pub mod catalog;
mod client;
mod command;
mod config;
mod error;
mod reply;
mod transport;

pub use camcgi::{access_response, parse_reply, CamQuery, CamReply, RawReply};
pub use client::{CommandClient, CommandOutcome, CommandResult};
pub use command::{Command, EffectSource, PropertyEffect, Route};
pub use config::ClientConfig;
pub use error::{CommandError, Result};
pub use reply::{Reply, ReplySchema};
pub use transport::{ControlRequest, ControlResponse, ControlTransport, HttpTransport};
