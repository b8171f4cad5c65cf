//! Peer-symmetric transport reconciliation.
//!
//! Unlike the session layer, every participant both emits and applies
//! play/pause/seek state, with no single source of truth. That keeps basic
//! playback working when the host is gone, but creates a feedback hazard:
//! applying a peer's state drives the local transport, which looks exactly
//! like a fresh user action. The dead-band and the echo gate are what keep
//! the room from oscillating.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use coview_protocol::{
    encode, PlaybackState, SessionState, StatePayload, SyncBody, SyncMessage, SEEK_DEADBAND_SECS,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::channel::BroadcastChannel;
use crate::echo::EchoGate;
use crate::participant::SyncCounters;
use crate::transport::{MediaTransport, TransportEvent, TransportStatus};
use crate::{ECHO_SUPPRESS_WINDOW, POLL_INTERVAL, UNBOUNDED_END_SEC};

/// Reconciles the local transport with peer state.
///
/// Driven by three inputs: inbound transport-family messages, the local
/// transport's event stream, and a 1 s position-sampling tick.
pub struct TransportSyncController {
    transport: Arc<dyn MediaTransport>,
    channel: Arc<dyn BroadcastChannel>,
    gate: Arc<EchoGate>,
    counters: Arc<SyncCounters>,
    session: watch::Receiver<SessionState>,
    last_known: PlaybackState,
}

impl TransportSyncController {
    pub fn new(
        transport: Arc<dyn MediaTransport>,
        channel: Arc<dyn BroadcastChannel>,
        gate: Arc<EchoGate>,
        counters: Arc<SyncCounters>,
        session: watch::Receiver<SessionState>,
    ) -> Self {
        let last_known = PlaybackState {
            is_playing: false,
            current_time_sec: 0.0,
            clip_id: String::new(),
            start_sec: 0.0,
            end_sec: UNBOUNDED_END_SEC,
        };
        Self {
            transport,
            channel,
            gate,
            counters,
            session,
            last_known,
        }
    }

    /// Event loop. Ends when the inbound queue closes (participant
    /// teardown).
    pub async fn run(mut self, mut inbound: mpsc::Receiver<SyncMessage>) {
        let mut events = self.transport.subscribe_events();
        let mut tick = tokio::time::interval(POLL_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                msg = inbound.recv() => match msg {
                    Some(msg) => self.apply(msg.body),
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => self.on_transport_event(event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "transport event stream lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = tick.tick() => self.on_tick(),
            }
        }
        debug!("transport sync controller stopped");
    }

    /// React to a local transport transition.
    pub fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Ready => {
                debug!("transport ready");
            }
            TransportEvent::StateChange(TransportStatus::Playing) => {
                // The inbound appliers record is_playing before commanding
                // the transport, so an echoed transition is never a
                // transition against last_known.
                if !self.last_known.is_playing {
                    let snap = self.outbound_snapshot();
                    self.broadcast(SyncBody::Play(snap.clone()));
                    self.last_known = snap;
                }
            }
            TransportEvent::StateChange(TransportStatus::Paused) => {
                if self.last_known.is_playing {
                    let snap = self.outbound_snapshot();
                    self.broadcast(SyncBody::Pause(snap.clone()));
                    self.last_known = snap;
                }
            }
            TransportEvent::StateChange(_) => {}
            TransportEvent::Error(code) => {
                warn!(code, "transport reported an error; continuing");
            }
        }
    }

    /// Position-sampling tick: detect discontinuous jumps.
    ///
    /// Normal playback advances position by about one tick per tick, which
    /// stays inside the dead-band and is silently absorbed. Only a scrub or
    /// programmatic correction exceeds it.
    pub fn on_tick(&mut self) {
        if !self.transport.is_ready() {
            return;
        }
        let observed = self.transport.current_time();
        let drift = (observed - self.last_known.current_time_sec).abs();

        if drift > SEEK_DEADBAND_SECS && !self.gate.is_open() {
            let snap = self.outbound_snapshot();
            self.broadcast(SyncBody::Seek(snap.clone()));
            self.last_known = snap;
        } else {
            self.last_known.current_time_sec = observed;
        }
    }

    /// Apply one inbound transport-family message.
    pub fn apply(&mut self, body: SyncBody) {
        if !self.transport.is_ready() {
            // No retry/backlog; the consumer re-requests state once ready.
            debug!(kind = body.name(), "transport not ready, dropping message");
            self.counters.dropped_not_ready.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match body {
            SyncBody::Play(state) => {
                self.apply_remote(state, Some(true));
            }
            SyncBody::Pause(state) => {
                self.gate.open_for(ECHO_SUPPRESS_WINDOW);
                self.transport.pause();
                self.last_known = state;
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
            }
            SyncBody::Seek(state) => {
                self.apply_remote(state, None);
            }
            SyncBody::StateRequest => {
                let snap = self.outbound_snapshot();
                self.broadcast(SyncBody::StateResponse(StatePayload::Playback(snap)));
            }
            SyncBody::StateResponse(StatePayload::Playback(state)) => {
                let play = state.is_playing;
                self.apply_remote(state, Some(play));
            }
            other => {
                debug!(kind = other.name(), "transport controller ignoring message");
            }
        }
    }

    /// Echo-gated wholesale application of a peer snapshot.
    ///
    /// `Some(true)` forces play and `Some(false)` forces pause; `None`
    /// leaves the play/pause status untouched (SEEK semantics).
    fn apply_remote(&mut self, state: PlaybackState, play: Option<bool>) {
        self.gate.open_for(ECHO_SUPPRESS_WINDOW);

        // A peer may be ahead of our session cache; follow its clip so the
        // seek lands on the right timeline.
        if !state.clip_id.is_empty()
            && self.transport.clip_id().as_deref() != Some(state.clip_id.as_str())
        {
            self.transport.load(&state.clip_id, state.current_time_sec);
        }

        let local = self.transport.current_time();
        if (state.current_time_sec - local).abs() > SEEK_DEADBAND_SECS {
            self.transport.seek(state.current_time_sec);
        }

        match play {
            Some(true) => self.transport.play(),
            Some(false) => self.transport.pause(),
            None => {}
        }

        let was_playing = match play {
            Some(p) => p,
            None => self.last_known.is_playing,
        };
        self.last_known = PlaybackState {
            is_playing: was_playing,
            ..state
        };
        self.counters.applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Freshest locally known state, stamped with the shared clip bounds
    /// when a task is active.
    fn outbound_snapshot(&self) -> PlaybackState {
        let (clip_id, start_sec, end_sec) = match &self.session.borrow().task {
            Some(task) => (task.clip_id.clone(), task.start_sec, task.end_sec),
            None => (
                self.transport.clip_id().unwrap_or_default(),
                0.0,
                UNBOUNDED_END_SEC,
            ),
        };
        PlaybackState {
            is_playing: self.transport.status() == TransportStatus::Playing,
            current_time_sec: self.transport.current_time(),
            clip_id,
            start_sec,
            end_sec,
        }
    }

    fn broadcast(&self, body: SyncBody) {
        let kind = body.name();
        match encode(&SyncMessage::new(body)) {
            Ok(frame) => match self.channel.send(frame) {
                Ok(()) => {
                    self.counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    // Degraded mode: playback continues locally without sync.
                    warn!(kind, "transport broadcast failed: {e}");
                }
            },
            Err(e) => warn!(kind, "failed to encode transport message: {e}"),
        }
    }
}
