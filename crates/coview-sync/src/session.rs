//! Host-authoritative session state: which clip is shared, how it is shown.
//!
//! Session decisions flow one way, from the host outward. Viewers overwrite
//! their cached copy wholesale on every authoritative message and may only
//! ask for a resync (`STATE_REQUEST`) after joining or reconnecting.

use std::sync::Arc;

use coview_protocol::{
    encode, Role, SessionState, StatePayload, SyncBody, SyncMessage, TaskRef,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::channel::BroadcastChannel;
use crate::echo::EchoGate;
use crate::transport::MediaTransport;
use crate::{CUE_SUPPRESS_WINDOW, ECHO_SUPPRESS_WINDOW};

/// Controller for the call-wide [`SessionState`].
///
/// The host mutates and broadcasts; viewers apply. The role is fixed for the
/// call's lifetime, so a viewer's mutation attempt is a logged no-op rather
/// than an error.
pub struct SessionStateController {
    role: Role,
    channel: Arc<dyn BroadcastChannel>,
    transport: Arc<dyn MediaTransport>,
    gate: Arc<EchoGate>,
    state: watch::Sender<SessionState>,
}

impl SessionStateController {
    pub fn new(
        role: Role,
        channel: Arc<dyn BroadcastChannel>,
        transport: Arc<dyn MediaTransport>,
        gate: Arc<EchoGate>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            role,
            channel,
            transport,
            gate,
            state,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Observable session state, for the presentation shell and the other
    /// controllers.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current snapshot of the session state.
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Share a clip with the whole call. Host only.
    pub fn share_clip(&self, task: TaskRef) -> coview_common::Result<()> {
        if !self.role.is_host() {
            warn!("share_clip called by a non-host; ignoring");
            return Ok(());
        }
        task.validate()?;

        let next = SessionState {
            task: Some(task),
            mode: self.current().mode,
        };
        self.apply(next.clone());
        self.broadcast(SyncBody::SetTask(next));
        Ok(())
    }

    /// Stop sharing the current clip. Host only.
    pub fn clear_clip(&self) {
        if !self.role.is_host() {
            warn!("clear_clip called by a non-host; ignoring");
            return;
        }
        let next = SessionState {
            task: None,
            mode: self.current().mode,
        };
        self.apply(next.clone());
        self.broadcast(SyncBody::ClearTask(next));
    }

    /// Change the call-wide display mode. Host only.
    pub fn set_mode(&self, mode: coview_protocol::DisplayMode) {
        if !self.role.is_host() {
            warn!("set_mode called by a non-host; ignoring");
            return;
        }
        let next = SessionState {
            task: self.current().task,
            mode,
        };
        self.apply(next.clone());
        self.broadcast(SyncBody::SetMode(next));
    }

    /// Ask the room for the authoritative state. Any participant; issued
    /// once on join/reconnect. If the host is absent no response ever
    /// arrives and the caller stays on its last-known state.
    pub fn request_state(&self) {
        self.broadcast(SyncBody::StateRequest);
    }

    /// Apply one inbound session-family message.
    pub fn handle_message(&self, body: &SyncBody, sender_id: &str) {
        match body {
            SyncBody::SetTask(state) | SyncBody::ClearTask(state) | SyncBody::SetMode(state) => {
                if self.role.is_host() {
                    // Only this participant's own UI may mutate the session.
                    debug!(sender = sender_id, kind = body.name(), "host ignoring session mutation from peer");
                    return;
                }
                self.apply(state.clone());
            }
            SyncBody::StateResponse(StatePayload::Session(state)) => {
                if self.role.is_host() {
                    debug!(sender = sender_id, "host ignoring session state response");
                    return;
                }
                self.apply(state.clone());
            }
            SyncBody::StateRequest => {
                if self.role.is_host() {
                    debug!(sender = sender_id, "answering session state request");
                    self.broadcast(SyncBody::StateResponse(StatePayload::Session(
                        self.current(),
                    )));
                }
            }
            other => {
                debug!(kind = other.name(), "session controller ignoring message");
            }
        }
    }

    /// Overwrite the local cached state and cue the local player to match.
    fn apply(&self, next: SessionState) {
        let previous = self.current();

        match &next.task {
            Some(task) => {
                // Re-cueing the same clip would yank everyone back to the
                // clip start, so only load on an actual change.
                if self.transport.clip_id().as_deref() != Some(task.clip_id.as_str()) {
                    // The cue jumps the position well past the dead-band;
                    // without the gate every participant would rebroadcast
                    // the jump as a competing SEEK on its next poll tick.
                    self.gate.open_for(CUE_SUPPRESS_WINDOW);
                    self.transport.load(&task.clip_id, task.start_sec);
                }
            }
            None => {
                if previous.task.is_some() {
                    self.gate.open_for(ECHO_SUPPRESS_WINDOW);
                    self.transport.pause();
                }
            }
        }

        self.state.send_replace(next);
    }

    fn broadcast(&self, body: SyncBody) {
        let kind = body.name();
        match encode(&SyncMessage::new(body)) {
            Ok(frame) => {
                if let Err(e) = self.channel.send(frame) {
                    // Degraded mode: local session continues, peers go stale.
                    warn!(kind, "session broadcast failed: {e}");
                }
            }
            Err(e) => warn!(kind, "failed to encode session message: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{InboundFrame, LocalRoom};
    use crate::transport::{SimulatedTransport, TransportStatus};
    use coview_protocol::{decode, DisplayMode};
    use tokio::sync::mpsc;

    fn controller(
        room: &LocalRoom,
        id: &str,
        role: Role,
    ) -> (SessionStateController, Arc<SimulatedTransport>, Arc<EchoGate>) {
        let transport = Arc::new(SimulatedTransport::new());
        transport.mark_ready();
        let gate = Arc::new(EchoGate::new());
        let channel = Arc::new(room.join(id));
        (
            SessionStateController::new(role, channel, transport.clone(), gate.clone()),
            transport,
            gate,
        )
    }

    async fn next_body(rx: &mut mpsc::Receiver<InboundFrame>) -> SyncBody {
        let frame = rx.recv().await.expect("frame");
        decode(&frame.payload).expect("decode").body
    }

    #[tokio::test]
    async fn host_share_clip_broadcasts_full_state() {
        let room = LocalRoom::new();
        let observer = room.join("observer");
        let mut rx = observer.subscribe();

        let (host, transport, _) = controller(&room, "host", Role::Host);
        host.share_clip(TaskRef::new("abc", 0.0, 120.0)).unwrap();

        match next_body(&mut rx).await {
            SyncBody::SetTask(state) => {
                assert_eq!(state.task.unwrap().clip_id, "abc");
                assert_eq!(state.mode, DisplayMode::Docked);
            }
            other => panic!("expected SET_TASK, got {other:?}"),
        }
        assert_eq!(transport.clip_id().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn non_host_share_clip_is_a_silent_no_op() {
        let room = LocalRoom::new();
        let observer = room.join("observer");
        let mut rx = observer.subscribe();

        let (viewer, _, _) = controller(&room, "viewer", Role::Viewer);
        viewer.share_clip(TaskRef::new("abc", 0.0, 120.0)).unwrap();

        assert!(viewer.current().task.is_none());
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn viewer_applies_authoritative_messages_verbatim() {
        let room = LocalRoom::new();
        let (viewer, transport, _) = controller(&room, "viewer", Role::Viewer);

        let shared = SessionState {
            task: Some(TaskRef::new("abc", 5.0, 60.0)),
            mode: DisplayMode::Fullscreen,
        };
        viewer.handle_message(&SyncBody::SetTask(shared.clone()), "host");

        assert_eq!(viewer.current(), shared);
        assert_eq!(transport.clip_id().as_deref(), Some("abc"));
        assert_eq!(transport.current_time(), 5.0);
    }

    #[tokio::test]
    async fn cueing_a_shared_clip_opens_the_echo_gate() {
        let room = LocalRoom::new();
        let (viewer, transport, gate) = controller(&room, "viewer", Role::Viewer);

        viewer.handle_message(
            &SyncBody::SetTask(SessionState {
                task: Some(TaskRef::new("vid1", 30.0, 120.0)),
                mode: DisplayMode::Docked,
            }),
            "host",
        );

        // The cue jumped the position to 30 s; the gate must already be open
        // so the seek detector absorbs the jump instead of rebroadcasting it.
        assert_eq!(transport.current_time(), 30.0);
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn clearing_the_task_pauses_the_viewer_transport() {
        let room = LocalRoom::new();
        let (viewer, transport, _) = controller(&room, "viewer", Role::Viewer);

        viewer.handle_message(
            &SyncBody::SetTask(SessionState {
                task: Some(TaskRef::new("abc", 0.0, 60.0)),
                mode: DisplayMode::Docked,
            }),
            "host",
        );
        transport.play();
        assert_eq!(transport.status(), TransportStatus::Playing);

        viewer.handle_message(
            &SyncBody::ClearTask(SessionState::default()),
            "host",
        );
        assert!(viewer.current().task.is_none());
        assert_eq!(transport.status(), TransportStatus::Paused);
    }

    #[tokio::test]
    async fn host_answers_state_requests_with_its_state() {
        let room = LocalRoom::new();
        let observer = room.join("observer");
        let mut rx = observer.subscribe();

        let (host, _, _) = controller(&room, "host", Role::Host);
        host.share_clip(TaskRef::new("abc", 0.0, 120.0)).unwrap();
        let _ = next_body(&mut rx).await; // SET_TASK

        host.handle_message(&SyncBody::StateRequest, "late-viewer");
        match next_body(&mut rx).await {
            SyncBody::StateResponse(StatePayload::Session(state)) => {
                assert_eq!(state.task.unwrap().clip_id, "abc");
            }
            other => panic!("expected session STATE_RESPONSE, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn host_ignores_session_mutations_from_peers() {
        let room = LocalRoom::new();
        let (host, _, _) = controller(&room, "host", Role::Host);
        host.share_clip(TaskRef::new("abc", 0.0, 120.0)).unwrap();

        host.handle_message(
            &SyncBody::SetTask(SessionState {
                task: Some(TaskRef::new("evil", 0.0, 10.0)),
                mode: DisplayMode::Pip,
            }),
            "imposter",
        );
        assert_eq!(host.current().task.unwrap().clip_id, "abc");
    }

    #[tokio::test]
    async fn share_clip_rejects_invalid_ranges() {
        let room = LocalRoom::new();
        let (host, _, _) = controller(&room, "host", Role::Host);
        assert!(host.share_clip(TaskRef::new("abc", 60.0, 10.0)).is_err());
        assert!(host.current().task.is_none());
    }
}
