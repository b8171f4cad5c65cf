//! Playback and session value types copied on every sync message.

use coview_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Transport-level playback snapshot.
///
/// `current_time_sec` is relative to the clip's own timeline, never
/// wall-clock time. Copied wholesale into every transport-family message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Last observed transport position.
    pub current_time_sec: f64,
    /// Identifier of the media resource (e.g. an externally hosted video id).
    pub clip_id: String,
    /// Inclusive loop start.
    pub start_sec: f64,
    /// Exclusive loop end.
    pub end_sec: f64,
}

impl PlaybackState {
    /// Snapshot for a clip that has not started yet.
    pub fn idle(clip_id: impl Into<String>, start_sec: f64, end_sec: f64) -> Self {
        Self {
            is_playing: false,
            current_time_sec: start_sec,
            clip_id: clip_id.into(),
            start_sec,
            end_sec,
        }
    }

    /// Check the clip-range invariant `0 <= start_sec < end_sec`.
    pub fn validate(&self) -> Result<()> {
        validate_range(self.start_sec, self.end_sec)
    }
}

/// Opaque reference to a shareable clip from the materials catalog.
///
/// The core reads the clip source id and loop bounds; every other field is
/// carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub clip_id: String,
    pub start_sec: f64,
    pub end_sec: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TaskRef {
    pub fn new(clip_id: impl Into<String>, start_sec: f64, end_sec: f64) -> Self {
        Self {
            clip_id: clip_id.into(),
            start_sec,
            end_sec,
            extra: serde_json::Map::new(),
        }
    }

    /// The `[start_sec, end_sec)` loop window.
    pub fn bounds(&self) -> (f64, f64) {
        (self.start_sec, self.end_sec)
    }

    /// Check the clip-range invariant `0 <= start_sec < end_sec`.
    pub fn validate(&self) -> Result<()> {
        validate_range(self.start_sec, self.end_sec)
    }
}

fn validate_range(start_sec: f64, end_sec: f64) -> Result<()> {
    if !start_sec.is_finite() || !end_sec.is_finite() {
        return Err(Error::protocol("clip range must be finite"));
    }
    if start_sec < 0.0 {
        return Err(Error::protocol(format!(
            "clip start must be >= 0, got {start_sec}"
        )));
    }
    if start_sec >= end_sec {
        return Err(Error::protocol(format!(
            "clip range must satisfy start < end, got [{start_sec}, {end_sec})"
        )));
    }
    Ok(())
}

/// How the shared player is displayed on every participant's screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Docked,
    Pip,
    Fullscreen,
}

/// Host-owned session snapshot: which clip is shared (if any) and how it is
/// displayed. Viewers overwrite their cached copy wholesale whenever an
/// authoritative message arrives.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub task: Option<TaskRef>,
    // Required on the wire so a session payload is structurally distinct
    // from a playback payload.
    pub mode: DisplayMode,
}

/// Participant role, fixed at join time for the lifetime of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Decides which clip is shared and in which display mode.
    Host,
    /// Receives session-level state but cannot originate it.
    Viewer,
}

impl Role {
    pub fn is_host(self) -> bool {
        matches!(self, Role::Host)
    }
}
