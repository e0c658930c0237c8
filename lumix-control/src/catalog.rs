//! Constructors for the camera's `cam.cgi` commands.
//!
//! Each returns a [`Command`] carrying its query, the reply schema and the
//! state properties its reply reports, ready for
//! [`CommandClient::invoke`](crate::CommandClient::invoke). Commands marked
//! idle-only are refused while the camera reports local operation.

use lumix_state::keys;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::camcgi::CamQuery;
use crate::command::{Command, EffectSource};
use crate::reply::ReplySchema;

/// Default UDP port the camera streams live view to
pub const DEFAULT_STREAM_PORT: u16 = 49152;

/// Focus drive step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusStep {
    WideFast,
    WideNormal,
    TeleFast,
    TeleNormal,
}

impl fmt::Display for FocusStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FocusStep::WideFast => "wide-fast",
            FocusStep::WideNormal => "wide-normal",
            FocusStep::TeleFast => "tele-fast",
            FocusStep::TeleNormal => "tele-normal",
        })
    }
}

/// Zoom drive direction and speed; the lens keeps moving until
/// [`zoom_stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomStep {
    WideFast,
    WideNormal,
    TeleFast,
    TeleNormal,
}

impl fmt::Display for ZoomStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ZoomStep::WideFast => "wide-fast",
            ZoomStep::WideNormal => "wide-normal",
            ZoomStep::TeleFast => "tele-fast",
            ZoomStep::TeleNormal => "tele-normal",
        })
    }
}

/// Camera operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// Recording (shooting) mode; required for live view
    Rec,
    /// Playback mode
    Play,
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CameraMode::Rec => "rec",
            CameraMode::Play => "play",
        })
    }
}

fn camcmd(value: &str) -> Command {
    Command::query(value, CamQuery::new("camcmd").with_value(value))
}

pub fn zoom(step: ZoomStep) -> Command {
    let value = step.to_string();
    Command::query(format!("zoom {}", value), CamQuery::new("camcmd").with_value(value)).requires_idle()
}

pub fn zoom_stop() -> Command {
    camcmd("zoomstop").requires_idle()
}

/// Move focus one step; the reply reports the resulting focus position
pub fn focus_step(step: FocusStep) -> Command {
    Command::query(
        "focus",
        CamQuery::new("camctrl").with_type("focus").with_value(step),
    )
    .expect(ReplySchema::Values(vec!["FocusPosition".to_string()]))
    .reports(keys::FOCUS_POSITION, EffectSource::Output("FocusPosition".to_string()))
    .requires_idle()
}

/// Take a picture; allowed while the camera is operated locally
pub fn capture() -> Command {
    camcmd("capture")
}

/// Run one autofocus cycle
pub fn oneshot_af() -> Command {
    camcmd("oneshot_af")
}

pub fn start_recording() -> Command {
    camcmd("video_recstart").requires_idle()
}

pub fn stop_recording() -> Command {
    camcmd("video_recstop").requires_idle()
}

pub fn set_mode(mode: CameraMode) -> Command {
    let value = match mode {
        CameraMode::Rec => "recmode",
        CameraMode::Play => "playmode",
    };
    camcmd(value)
        .reports(keys::CAMERA_MODE, EffectSource::Constant(mode.to_string()))
        .requires_idle()
}

pub fn lcd_on() -> Command {
    camcmd("lcd_on").requires_idle()
}

pub fn menu_entry() -> Command {
    camcmd("menu_entry").requires_idle()
}

pub fn power_off() -> Command {
    camcmd("poweroff").requires_idle()
}

/// Ask the camera to stream live view to `port` on this host.
///
/// The camera only streams in [`CameraMode::Rec`].
pub fn start_stream(port: u16) -> Command {
    Command::query("startstream", CamQuery::new("startstream").with_value(port))
        .reports(keys::STREAM_PORT, EffectSource::Constant(port.to_string()))
        .requires_idle()
}

pub fn stop_stream() -> Command {
    Command::query("stopstream", CamQuery::new("stopstream")).requires_idle()
}

/// Read the full camera state; every reported property is applied.
///
/// Also keeps the remote session alive.
pub fn get_state() -> Command {
    Command::query("getstate", CamQuery::new("getstate")).expect(ReplySchema::State)
}
