//! Clip-range looping watchdog.
//!
//! Every participant independently knows the shared clip's bounds, so the
//! loop-back correction is purely local: no message is ever sent for it.
//! Participants can diverge by up to one polling interval before each
//! self-corrects.

use std::sync::Arc;

use coview_protocol::SessionState;
use tokio::sync::watch;
use tracing::debug;

use crate::echo::EchoGate;
use crate::transport::MediaTransport;
use crate::{CUE_SUPPRESS_WINDOW, RANGE_ENFORCE_INTERVAL};

/// Loops playback back to `start_sec` once `end_sec` is reached.
pub struct ClipRangeEnforcer {
    transport: Arc<dyn MediaTransport>,
    gate: Arc<EchoGate>,
    session: watch::Receiver<SessionState>,
}

impl ClipRangeEnforcer {
    pub fn new(
        transport: Arc<dyn MediaTransport>,
        gate: Arc<EchoGate>,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            transport,
            gate,
            session,
        }
    }

    /// Fixed-interval enforcement loop.
    pub async fn run(self) {
        let mut tick = tokio::time::interval(RANGE_ENFORCE_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            self.enforce_once();
        }
    }

    /// One enforcement pass.
    pub fn enforce_once(&self) {
        if !self.transport.is_ready() {
            return;
        }
        let bounds = self.session.borrow().task.as_ref().map(|t| t.bounds());
        let Some((start_sec, end_sec)) = bounds else {
            return;
        };

        let position = self.transport.current_time();
        if position >= end_sec {
            debug!(position, start_sec, end_sec, "looping clip back to start");
            // The jump would exceed the dead-band and be rebroadcast as a
            // competing SEEK by every participant at once.
            self.gate.open_for(CUE_SUPPRESS_WINDOW);
            self.transport.seek(start_sec);
        }
    }
}
