//! Camera state management
//!
//! The [`StateCache`] holds the last-known camera state: a map from
//! canonical property name (`zoom-position`, `battery-level`,
//! `recording-status`, ...) to value, plus a revision counter. The command
//! client and the event subscriber both write to it through
//! [`StateCache::apply`]; everyone else reads immutable [`CameraState`]
//! snapshots.
//!
//! # Iteration Patterns
//!
//! ```rust,ignore
//! // Blocking iteration (waits for updates)
//! for event in cache.changes() {
//!     println!("r{}: {} changed", event.revision, event.property);
//! }
//!
//! // Non-blocking
//! let changes = cache.changes();
//! for event in changes.drain() {
//!     println!("{:?}", event);
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! StateCache
//!     │
//!     └── Mutex<Inner>
//!             ├── revision: u64
//!             ├── properties: Arc<BTreeMap<String, PropertyValue>>  (copy-on-write)
//!             └── watchers: Vec<Watcher>  (bounded mpsc::sync_channel each)
//!                     │
//!                     └── ChangeIterator
//! ```

pub mod cache;
pub mod event;
pub mod iter;
pub mod state;
pub mod value;

pub use cache::{StateCache, StateUpdate, DEFAULT_WATCHER_CAPACITY};
pub use event::{ChangeEvent, UpdateSource};
pub use iter::ChangeIterator;
pub use state::CameraState;
pub use value::{keys, property_name, PropertyValue};
