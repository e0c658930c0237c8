//! Change events for property updates
//!
//! Every update applied to the [`StateCache`](crate::StateCache) emits a
//! `ChangeEvent` to each open change iterator.

use std::time::Instant;

use crate::value::PropertyValue;

/// Where an update came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSource {
    /// A successful command reply
    Command { action: String },
    /// An event notification, with its GENA sequence number when known
    Event { seq: Option<u32> },
    /// The cache was cleared on reconnect
    Reset,
}

/// A change event emitted when a property is updated
///
/// # Example
///
/// ```rust,ignore
/// for event in cache.changes() {
///     println!("r{} {} = {:?}", event.revision, event.property, event.value);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Revision produced by this update
    pub revision: u64,

    /// Canonical property name; empty for a reset
    pub property: String,

    /// New value; `None` for a reset
    pub value: Option<PropertyValue>,

    pub source: UpdateSource,

    /// When the update was applied
    pub timestamp: Instant,
}

impl ChangeEvent {
    pub(crate) fn new(
        revision: u64,
        property: String,
        value: Option<PropertyValue>,
        source: UpdateSource,
    ) -> Self {
        Self {
            revision,
            property,
            value,
            source,
            timestamp: Instant::now(),
        }
    }
}

impl PartialEq for ChangeEvent {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.revision == other.revision
            && self.property == other.property
            && self.value == other.value
            && self.source == other.source
    }
}
