//! The process-wide camera state cache.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::event::{ChangeEvent, UpdateSource};
use crate::iter::{feed, ChangeIterator, Watcher};
use crate::state::CameraState;
use crate::value::PropertyValue;

/// One property update.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    /// Canonical property name
    pub property: String,
    pub value: PropertyValue,
    pub source: UpdateSource,
}

impl StateUpdate {
    pub fn new(property: impl Into<String>, value: impl Into<PropertyValue>, source: UpdateSource) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            source,
        }
    }
}

/// Unread changes each watcher may hold before new ones are dropped
pub const DEFAULT_WATCHER_CAPACITY: usize = 1024;

struct Inner {
    revision: u64,
    properties: Arc<BTreeMap<String, PropertyValue>>,
    watchers: Vec<Watcher>,
    watcher_capacity: usize,
}

impl Inner {
    fn emit(&mut self, event: ChangeEvent) {
        self.watchers.retain(|watcher| watcher.offer(event.clone()));
    }

    fn apply_one(&mut self, update: StateUpdate) -> u64 {
        // Copies the map only if a snapshot still shares it
        Arc::make_mut(&mut self.properties).insert(update.property.clone(), update.value.clone());
        self.revision += 1;
        trace!(revision = self.revision, property = %update.property, value = %update.value, "state updated");

        let event = ChangeEvent::new(self.revision, update.property, Some(update.value), update.source);
        self.emit(event);
        self.revision
    }
}

/// Single shared source of truth for camera state.
///
/// Every write goes through one mutex, so readers never see a half-applied
/// batch and the revision counter advances by exactly one per update.
///
/// ```
/// use lumix_state::{StateCache, StateUpdate, UpdateSource};
///
/// let cache = StateCache::new();
/// let before = cache.get();
/// let revision = cache.apply(StateUpdate::new("zoom-position", 50, UpdateSource::Reset));
///
/// assert_eq!(revision, before.revision() + 1);
/// assert!(before.get("zoom-position").is_none());
/// assert_eq!(cache.get().get_i64("zoom-position"), Some(50));
/// ```
pub struct StateCache {
    inner: Mutex<Inner>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::with_watcher_capacity(DEFAULT_WATCHER_CAPACITY)
    }

    /// Cache whose change feeds each queue at most `capacity` unread changes
    pub fn with_watcher_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                revision: 0,
                properties: Arc::new(BTreeMap::new()),
                watchers: Vec::new(),
                watcher_capacity: capacity.max(1),
            }),
        }
    }

    /// Take an immutable snapshot of the current state
    pub fn get(&self) -> CameraState {
        let inner = self.inner.lock();
        CameraState::new(inner.revision, Arc::clone(&inner.properties))
    }

    /// Current revision without copying the snapshot
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    /// Apply one update and return the new revision
    pub fn apply(&self, update: StateUpdate) -> u64 {
        self.inner.lock().apply_one(update)
    }

    /// Apply updates in order under a single lock acquisition.
    ///
    /// Each update still advances the revision by one. Returns the last
    /// revision produced, or `None` if `updates` was empty.
    pub fn apply_all(&self, updates: impl IntoIterator<Item = StateUpdate>) -> Option<u64> {
        let mut inner = self.inner.lock();
        let mut last = None;
        for update in updates {
            last = Some(inner.apply_one(update));
        }
        last
    }

    /// Clear all properties; used when the camera is reconnected.
    ///
    /// Counts as one update, so the revision still advances.
    pub fn reset(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.properties = Arc::new(BTreeMap::new());
        inner.revision += 1;
        let revision = inner.revision;
        debug!(revision, "state cache reset");
        inner.emit(ChangeEvent::new(revision, String::new(), None, UpdateSource::Reset));
        revision
    }

    /// Open a change iterator that observes every update applied from now on.
    ///
    /// A watcher that falls more than the watcher capacity behind misses the
    /// newest changes; see [`ChangeIterator::missed`].
    pub fn changes(&self) -> ChangeIterator {
        let mut inner = self.inner.lock();
        let (watcher, changes) = feed(inner.watcher_capacity);
        inner.watchers.push(watcher);
        changes
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StateCache")
            .field("revision", &inner.revision)
            .field("properties", &inner.properties.len())
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}
