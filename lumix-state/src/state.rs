//! Immutable camera state snapshots.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::{keys, PropertyValue};

/// Point-in-time view of the camera state.
///
/// Snapshots share their property map with the cache until the cache is next
/// written, at which point the cache copies the map. A snapshot never changes
/// after it has been handed out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraState {
    revision: u64,
    properties: Arc<BTreeMap<String, PropertyValue>>,
}

impl CameraState {
    pub(crate) fn new(revision: u64, properties: Arc<BTreeMap<String, PropertyValue>>) -> Self {
        Self {
            revision,
            properties,
        }
    }

    /// Number of updates applied before this snapshot was taken
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Look up a property by canonical name
    pub fn get(&self, property: &str) -> Option<&PropertyValue> {
        self.properties.get(property)
    }

    /// Integer value of a property, if present and numeric
    pub fn get_i64(&self, property: &str) -> Option<i64> {
        self.get(property).and_then(PropertyValue::as_i64)
    }

    /// Whether the camera reported that it is being operated locally.
    ///
    /// The camera sends `busy` while its controls are in use and `update`
    /// once they are released.
    pub fn is_busy(&self) -> bool {
        self.get(keys::SYNC_STATUS)
            .and_then(PropertyValue::as_str)
            .is_some_and(|status| status == "busy")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
