//! The media transport seam and its in-process simulation.
//!
//! A [`MediaTransport`] wraps one embeddable player instance (e.g. a hosted
//! video iframe). It owns no synchronization logic; controllers drive it and
//! observe its event stream.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

/// Player status as reported by the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Unstarted,
    Playing,
    Paused,
    Buffering,
}

/// Events emitted by a media transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The player finished initializing and accepts commands.
    Ready,
    /// Play/pause/buffer transition.
    StateChange(TransportStatus),
    /// Player-reported error code.
    Error(i32),
}

/// One participant's embeddable media player. Instances are per-participant
/// and never shared across the call.
///
/// Commands are fire-and-forget; a transport that is not ready ignores them.
pub trait MediaTransport: Send + Sync {
    fn play(&self);
    fn pause(&self);
    fn seek(&self, seconds: f64);
    /// Point the player at a clip and cue it at `start_sec`, paused.
    fn load(&self, clip_id: &str, start_sec: f64);
    fn current_time(&self) -> f64;
    fn status(&self) -> TransportStatus;
    fn is_ready(&self) -> bool;
    /// Id of the currently loaded clip, if any.
    fn clip_id(&self) -> Option<String>;
    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent>;
}

const EVENT_CHANNEL_CAPACITY: usize = 32;

struct SimulatedInner {
    ready: bool,
    status: TransportStatus,
    clip_id: Option<String>,
    /// Position at the last play/pause/seek/load boundary.
    base_position: f64,
    /// Set while playing; position advances from `base_position` with it.
    resumed_at: Option<Instant>,
}

/// Clock-driven in-process transport used by tests and the demo binary.
///
/// Position advances with `tokio::time::Instant` while playing, so it is
/// fully deterministic under a paused test clock.
pub struct SimulatedTransport {
    inner: Mutex<SimulatedInner>,
    events: broadcast::Sender<TransportEvent>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(SimulatedInner {
                ready: false,
                status: TransportStatus::Unstarted,
                clip_id: None,
                base_position: 0.0,
                resumed_at: None,
            }),
            events,
        }
    }

    /// Flip the transport to ready, as a real player does after init.
    pub fn mark_ready(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.ready {
                return;
            }
            inner.ready = true;
        }
        let _ = self.events.send(TransportEvent::Ready);
    }

    /// Inject a player error event.
    pub fn raise_error(&self, code: i32) {
        let _ = self.events.send(TransportEvent::Error(code));
    }

    fn position_of(inner: &SimulatedInner) -> f64 {
        match inner.resumed_at {
            Some(since) => inner.base_position + since.elapsed().as_secs_f64(),
            None => inner.base_position,
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaTransport for SimulatedTransport {
    fn play(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.ready || inner.status == TransportStatus::Playing {
                return;
            }
            inner.resumed_at = Some(Instant::now());
            inner.status = TransportStatus::Playing;
        }
        let _ = self
            .events
            .send(TransportEvent::StateChange(TransportStatus::Playing));
    }

    fn pause(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.ready || inner.status != TransportStatus::Playing {
                return;
            }
            let position = Self::position_of(&inner);
            inner.base_position = position;
            inner.resumed_at = None;
            inner.status = TransportStatus::Paused;
        }
        let _ = self
            .events
            .send(TransportEvent::StateChange(TransportStatus::Paused));
    }

    fn seek(&self, seconds: f64) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.ready {
            return;
        }
        inner.base_position = seconds.max(0.0);
        if inner.resumed_at.is_some() {
            inner.resumed_at = Some(Instant::now());
        }
    }

    fn load(&self, clip_id: &str, start_sec: f64) {
        {
            let mut inner = self.inner.lock().unwrap();
            debug!(clip_id, start_sec, "loading clip into simulated transport");
            inner.clip_id = Some(clip_id.to_string());
            inner.base_position = start_sec.max(0.0);
            inner.resumed_at = None;
            inner.status = TransportStatus::Unstarted;
        }
        let _ = self
            .events
            .send(TransportEvent::StateChange(TransportStatus::Unstarted));
    }

    fn current_time(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        Self::position_of(&inner)
    }

    fn status(&self) -> TransportStatus {
        self.inner.lock().unwrap().status
    }

    fn is_ready(&self) -> bool {
        self.inner.lock().unwrap().ready
    }

    fn clip_id(&self) -> Option<String> {
        self.inner.lock().unwrap().clip_id.clone()
    }

    fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}
