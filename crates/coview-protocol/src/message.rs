//! The `SyncMessage` wire envelope and its JSON codec.
//!
//! Every frame on the room channel is one UTF-8 JSON object:
//! `{ "type": "...", "data": ..., "timestamp": ... }`. Two logical message
//! families share the envelope: transport control (`PLAY`/`PAUSE`/`SEEK`)
//! is peer-symmetric, session control (`SET_TASK`/`CLEAR_TASK`/`SET_MODE`)
//! is host-authoritative. `STATE_REQUEST`/`STATE_RESPONSE` serve both
//! families; a response is disambiguated by its payload shape.

use bytes::Bytes;
use coview_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::playback::{PlaybackState, SessionState};
use crate::MAX_FRAME_BYTES;

/// Message body, tagged on the wire as `type` with the payload under `data`.
///
/// Unknown tags decode to [`SyncBody::Unknown`] so newer peers can introduce
/// message types without breaking older ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SyncBody {
    // Transport family (any participant may originate these).
    #[serde(rename = "PLAY")]
    Play(PlaybackState),
    #[serde(rename = "PAUSE")]
    Pause(PlaybackState),
    #[serde(rename = "SEEK")]
    Seek(PlaybackState),

    // Session family (host-originated only).
    #[serde(rename = "SET_TASK")]
    SetTask(SessionState),
    #[serde(rename = "CLEAR_TASK")]
    ClearTask(SessionState),
    #[serde(rename = "SET_MODE")]
    SetMode(SessionState),

    // Shared by both families.
    #[serde(rename = "STATE_REQUEST")]
    StateRequest,
    #[serde(rename = "STATE_RESPONSE")]
    StateResponse(StatePayload),

    /// Any `type` this build does not know. Always ignored.
    #[serde(other)]
    Unknown,
}

/// Payload of a `STATE_RESPONSE`, one per message family.
///
/// Playback and session snapshots have disjoint required fields, so the
/// untagged decode is unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatePayload {
    Playback(PlaybackState),
    Session(SessionState),
}

/// Which controller(s) a message body is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Transport,
    Session,
    Both,
}

impl SyncBody {
    /// Routing family, or `None` for bodies nobody should handle.
    pub fn family(&self) -> Option<Family> {
        match self {
            SyncBody::Play(_) | SyncBody::Pause(_) | SyncBody::Seek(_) => Some(Family::Transport),
            SyncBody::SetTask(_) | SyncBody::ClearTask(_) | SyncBody::SetMode(_) => {
                Some(Family::Session)
            }
            SyncBody::StateRequest => Some(Family::Both),
            SyncBody::StateResponse(StatePayload::Playback(_)) => Some(Family::Transport),
            SyncBody::StateResponse(StatePayload::Session(_)) => Some(Family::Session),
            SyncBody::Unknown => None,
        }
    }

    /// Wire tag, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SyncBody::Play(_) => "PLAY",
            SyncBody::Pause(_) => "PAUSE",
            SyncBody::Seek(_) => "SEEK",
            SyncBody::SetTask(_) => "SET_TASK",
            SyncBody::ClearTask(_) => "CLEAR_TASK",
            SyncBody::SetMode(_) => "SET_MODE",
            SyncBody::StateRequest => "STATE_REQUEST",
            SyncBody::StateResponse(_) => "STATE_RESPONSE",
            SyncBody::Unknown => "UNKNOWN",
        }
    }
}

/// Wire envelope: a body plus a sender-local timestamp.
///
/// The timestamp is advisory only (epoch milliseconds at send time). It is
/// never consulted for conflict resolution; delivery order decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(flatten)]
    pub body: SyncBody,
    pub timestamp: i64,
}

impl SyncMessage {
    /// Wrap a body with the current wall-clock timestamp.
    pub fn new(body: SyncBody) -> Self {
        Self {
            body,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Encode a message to its JSON frame.
pub fn encode(msg: &SyncMessage) -> Result<Bytes> {
    let buf = serde_json::to_vec(msg).map_err(Error::serialization)?;
    if buf.len() > MAX_FRAME_BYTES {
        return Err(Error::protocol(format!(
            "encoded frame is {} bytes, limit is {}",
            buf.len(),
            MAX_FRAME_BYTES
        )));
    }
    Ok(Bytes::from(buf))
}

/// Decode a JSON frame. Fails on oversized or malformed input; callers log
/// and drop, they never crash the handler loop.
pub fn decode(frame: &[u8]) -> Result<SyncMessage> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(Error::protocol(format!(
            "inbound frame is {} bytes, limit is {}",
            frame.len(),
            MAX_FRAME_BYTES
        )));
    }
    serde_json::from_slice(frame).map_err(Error::serialization)
}
