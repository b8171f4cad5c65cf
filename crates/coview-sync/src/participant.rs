//! Participant wiring: one transport, one room channel, the full
//! controller set, and teardown.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use coview_protocol::{decode, Family, Role, SessionState};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::BroadcastChannel;
use crate::echo::EchoGate;
use crate::range::ClipRangeEnforcer;
use crate::session::SessionStateController;
use crate::transport::MediaTransport;
use crate::transport_sync::TransportSyncController;

const TRANSPORT_QUEUE_CAPACITY: usize = 64;

/// Running message counters for one participant, for diagnostics.
#[derive(Debug, Default)]
pub struct SyncCounters {
    pub sent: AtomicU64,
    pub applied: AtomicU64,
    pub dropped_malformed: AtomicU64,
    pub dropped_not_ready: AtomicU64,
}

/// One call participant: dispatch task, transport sync task, and range
/// watchdog, all torn down together.
///
/// Dropping (or calling [`shutdown`](Self::shutdown)) aborts every spawned
/// task so no timer or callback outlives the transport.
pub struct Participant {
    id: String,
    session: Arc<SessionStateController>,
    counters: Arc<SyncCounters>,
    tasks: Vec<JoinHandle<()>>,
}

impl Participant {
    /// Wire a transport and a room channel into a running participant.
    ///
    /// The channel subscription is established before this returns, so a
    /// `request_state()` issued afterwards cannot miss its response.
    pub fn spawn(
        id: impl Into<String>,
        role: Role,
        transport: Arc<dyn MediaTransport>,
        channel: Arc<dyn BroadcastChannel>,
    ) -> Self {
        let id = id.into();
        let gate = Arc::new(EchoGate::new());
        let counters = Arc::new(SyncCounters::default());

        let session = Arc::new(SessionStateController::new(
            role,
            channel.clone(),
            transport.clone(),
            gate.clone(),
        ));
        let session_rx = session.state();

        let sync = TransportSyncController::new(
            transport.clone(),
            channel.clone(),
            gate.clone(),
            counters.clone(),
            session_rx.clone(),
        );
        let enforcer = ClipRangeEnforcer::new(transport, gate, session_rx);

        let inbound = channel.subscribe();
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_QUEUE_CAPACITY);

        let tasks = vec![
            tokio::spawn(dispatch_loop(
                id.clone(),
                inbound,
                transport_tx,
                session.clone(),
                counters.clone(),
            )),
            tokio::spawn(sync.run(transport_rx)),
            tokio::spawn(enforcer.run()),
        ];

        info!(participant = %id, ?role, "participant joined sync session");
        Participant {
            id,
            session,
            counters,
            tasks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session controller: `share_clip`/`clear_clip`/`set_mode` for
    /// hosts, `request_state` for everyone.
    pub fn session(&self) -> &SessionStateController {
        &self.session
    }

    /// Observable session state for the presentation shell.
    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session.state()
    }

    /// Broadcast a `STATE_REQUEST`. The host answers with the session
    /// state; any ready peer answers with its playback state.
    pub fn request_state(&self) {
        self.session.request_state();
    }

    pub fn counters(&self) -> &SyncCounters {
        &self.counters
    }

    /// Stop all controller tasks. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decode inbound frames and route them to the owning controller(s).
async fn dispatch_loop(
    id: String,
    mut inbound: mpsc::Receiver<crate::channel::InboundFrame>,
    transport_tx: mpsc::Sender<coview_protocol::SyncMessage>,
    session: Arc<SessionStateController>,
    counters: Arc<SyncCounters>,
) {
    while let Some(frame) = inbound.recv().await {
        let msg = match decode(&frame.payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(participant = %id, sender = %frame.sender_id, "dropping malformed frame: {e}");
                counters
                    .dropped_malformed
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                continue;
            }
        };

        match msg.body.family() {
            None => {
                debug!(participant = %id, "ignoring message of unknown type");
            }
            Some(Family::Session) => session.handle_message(&msg.body, &frame.sender_id),
            Some(Family::Transport) => {
                if transport_tx.send(msg).await.is_err() {
                    break;
                }
            }
            Some(Family::Both) => {
                session.handle_message(&msg.body, &frame.sender_id);
                if transport_tx.send(msg).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!(participant = %id, "dispatch loop stopped");
}
