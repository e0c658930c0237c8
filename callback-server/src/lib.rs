//! UPnP callback server for receiving camera event notifications.
//!
//! This crate provides a lightweight HTTP server for handling UPnP NOTIFY
//! requests. It has no knowledge of the camera's property model; it only
//! validates the GENA headers and hands the raw `propertyset` body to whoever
//! registered the subscription ID.
//!
//! # Overview
//!
//! - [`CallbackServer`]: binds a local port and accepts NOTIFY requests.
//! - [`EventRouter`]: maps subscription IDs to per-subscription channels.
//! - [`NotificationPayload`]: subscription ID, event sequence number, sender
//!   address and raw XML body of one notification.
//!
//! # Example
//!
//! ```no_run
//! use callback_server::{CallbackServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callback_server::CallbackError> {
//!     let server = CallbackServer::start(ServerConfig::default()).await?;
//!     println!("NOTIFY target: {}", server.callback_url());
//!
//!     let mut notifications = server.router().register("uuid:sub-1".to_string()).await;
//!     while let Some(notification) = notifications.recv().await {
//!         println!("seq {:?}: {}", notification.seq, notification.event_xml);
//!     }
//!
//!     server.shutdown().await
//! }
//! ```

mod error;
pub mod router;
mod server;

pub use error::CallbackError;
pub use router::{EventRouter, NotificationPayload, RouteOutcome};
pub use server::{CallbackServer, ServerConfig};
