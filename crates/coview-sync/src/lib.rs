//! Coview synchronization core.
//!
//! Keeps every participant in a call watching the same clip in near
//! lock-step:
//! - [`TransportSyncController`]: peer-symmetric play/pause/seek
//!   reconciliation with dead-band and echo suppression
//! - [`SessionStateController`]: host-authoritative "which clip, which
//!   display mode" with a state-request recovery path for late joiners
//! - [`ClipRangeEnforcer`]: local watchdog looping playback inside the
//!   shared clip's `[start, end)` window
//! - [`Participant`]: wires one media transport and one room channel into
//!   the running controller set, with teardown
//!
//! The real media player and the room's data channel live behind the
//! [`MediaTransport`] and [`BroadcastChannel`] traits; `SimulatedTransport`
//! and `LocalRoom` are the in-process implementations used by tests and the
//! demo binary.

#![forbid(unsafe_code)]

pub mod channel;
pub mod echo;
pub mod participant;
pub mod range;
pub mod session;
pub mod transport;
pub mod transport_sync;

pub use channel::{BroadcastChannel, InboundFrame, LocalRoom, RoomChannel};
pub use echo::EchoGate;
pub use participant::{Participant, SyncCounters};
pub use range::ClipRangeEnforcer;
pub use session::SessionStateController;
pub use transport::{MediaTransport, SimulatedTransport, TransportEvent, TransportStatus};
pub use transport_sync::TransportSyncController;

use std::time::Duration;

/// Position sampling cadence for the outbound seek detector.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Clip-range watchdog cadence.
pub const RANGE_ENFORCE_INTERVAL: Duration = Duration::from_secs(1);

/// How long the echo gate stays open after applying an inbound state change.
/// Long enough for the transport to settle without re-triggering outbound
/// detection.
pub const ECHO_SUPPRESS_WINDOW: Duration = Duration::from_millis(500);

/// Suppression window for locally commanded position jumps (cueing a newly
/// shared clip, looping back to the clip start). Longer than one poll
/// interval so the seek detector is guaranteed to absorb the jump into its
/// cached position before the gate closes.
pub const CUE_SUPPRESS_WINDOW: Duration = Duration::from_millis(1500);

/// Loop end used when no clip range is configured.
pub const UNBOUNDED_END_SEC: f64 = f64::MAX;
