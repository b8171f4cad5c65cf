//! Coview wire protocol types and framing.
//!
//! This crate provides:
//! - `PlaybackState` / `SessionState` value types shared by every message
//! - The `SyncMessage` JSON envelope with its two logical message families
//!   (peer-symmetric transport control, host-authoritative session control)
//! - Encode/decode with forward-compatible unknown-type tolerance
//!
//! No I/O lives here; the room channel and the media player are consumed
//! behind traits in `coview-sync`.

#![forbid(unsafe_code)]

pub mod message;
pub mod playback;

pub use message::{decode, encode, Family, StatePayload, SyncBody, SyncMessage};
pub use playback::{DisplayMode, PlaybackState, Role, SessionState, TaskRef};

/// Maximum accepted size of a single encoded sync frame.
/// Prevents memory exhaustion from malformed or malicious payloads; real
/// messages are a few hundred bytes.
pub const MAX_FRAME_BYTES: usize = 32 * 1024;

/// Position drift below this threshold is normal playback advance, not a
/// deliberate seek.
pub const SEEK_DEADBAND_SECS: f64 = 1.0;
