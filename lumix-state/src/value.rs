//! Property values and camera property naming.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of one camera property.
///
/// Values arrive as text from replies and notifications; anything that
/// parses as a signed integer is kept as an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Text(String),
}

impl PropertyValue {
    /// Parse a raw textual value
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(n) => PropertyValue::Integer(n),
            Err(_) => PropertyValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(n) => Some(*n),
            PropertyValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Integer(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(n) => write!(f, "{n}"),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value.into())
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        PropertyValue::Integer(value.into())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

/// Canonical property names used in [`CameraState`](crate::CameraState).
pub mod keys {
    pub const BATTERY_LEVEL: &str = "battery-level";
    pub const CAMERA_MODE: &str = "camera-mode";
    pub const FOCUS_POSITION: &str = "focus-position";
    pub const RECORDING_MODE: &str = "recording-mode";
    pub const RECORDING_STATUS: &str = "recording-status";
    pub const STREAM_PORT: &str = "stream-port";
    pub const SYNC_STATUS: &str = "sync-status";
    pub const ZOOM_POSITION: &str = "zoom-position";
}

/// Map a device element name to its canonical property name.
///
/// Panasonic vendor elements and the short `getstate` tags have fixed
/// names. Everything else is converted to kebab-case:
/// `BatteryLevel` becomes `battery-level`, `sd_memory` becomes `sd-memory`.
pub fn property_name(raw: &str) -> String {
    match raw {
        "X_Panasonic_Cam_Sync" => return keys::SYNC_STATUS.to_string(),
        "X_Panasonic_Cam_VRec" => return keys::RECORDING_STATUS.to_string(),
        "cammode" => return keys::CAMERA_MODE.to_string(),
        "batt" | "battery" => return keys::BATTERY_LEVEL.to_string(),
        "rec" => return keys::RECORDING_STATUS.to_string(),
        _ => {}
    }

    let mut name = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for c in raw.chars() {
        if c == '_' || c == ' ' || c == '-' {
            if !name.ends_with('-') && !name.is_empty() {
                name.push('-');
            }
            prev_lower = false;
        } else if c.is_ascii_uppercase() {
            if prev_lower && !name.ends_with('-') {
                name.push('-');
            }
            name.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            name.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    name
}
