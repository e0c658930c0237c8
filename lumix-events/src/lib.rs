//! # Lumix Events
//!
//! Leased UPnP (GENA) event subscriptions for Lumix cameras.
//!
//! An [`EventSubscriber`] owns one HTTP callback listener. Each call to
//! [`EventSubscriber::subscribe`] sends SUBSCRIBE to the camera's event URL,
//! renews the lease before it runs out, applies every notification to the
//! shared [`StateCache`](lumix_state::StateCache) and yields it on an
//! [`EventStream`].
//!
//! ```rust,ignore
//! use lumix_events::{EventConfig, EventSubscriber};
//! use lumix_state::StateCache;
//! use std::sync::Arc;
//!
//! let state = Arc::new(StateCache::new());
//! let subscriber = EventSubscriber::start(Arc::clone(&state), EventConfig::default()).await?;
//! let mut events = subscriber.subscribe(&camera).await?;
//!
//! while let Some(Ok(notification)) = events.next().await {
//!     println!("revision {:?}", notification.revision);
//! }
//! ```
//!
//! Notifications are applied in arrival order. A gap in the SEQ header is
//! logged but never blocks later notifications. Malformed bodies are logged
//! and skipped.

mod config;
mod error;
mod propertyset;
mod stream;
mod subscriber;

pub use config::EventConfig;
pub use error::{EventError, Result};
pub use propertyset::parse_propertyset;
pub use stream::{EventItem, EventStream, Notification};
pub use subscriber::EventSubscriber;
