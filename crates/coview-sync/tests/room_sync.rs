//! Whole-room scenarios: several participants on one in-memory room,
//! driven by a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use coview_protocol::{Role, TaskRef};
use coview_sync::{
    BroadcastChannel, LocalRoom, MediaTransport, Participant, SimulatedTransport, TransportStatus,
};

struct Peer {
    participant: Participant,
    transport: Arc<SimulatedTransport>,
}

fn join(room: &LocalRoom, id: &str, role: Role) -> Peer {
    let transport = Arc::new(SimulatedTransport::new());
    transport.mark_ready();
    let media: Arc<dyn MediaTransport> = transport.clone();
    let channel: Arc<dyn BroadcastChannel> = Arc::new(room.join(id));
    Peer {
        participant: Participant::spawn(id, role, media, channel),
        transport,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test(start_paused = true)]
async fn host_play_reaches_a_present_viewer() {
    let room = LocalRoom::new();
    let host = join(&room, "host", Role::Host);
    let viewer = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    host.participant
        .session()
        .share_clip(TaskRef::new("vid1", 0.0, 120.0))
        .unwrap();
    settle().await;

    assert_eq!(viewer.transport.clip_id().as_deref(), Some("vid1"));

    host.transport.play();
    settle().await;

    assert_eq!(viewer.transport.status(), TransportStatus::Playing);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let drift = (host.transport.current_time() - viewer.transport.current_time()).abs();
    assert!(drift <= 1.0, "drift was {drift}");
}

#[tokio::test(start_paused = true)]
async fn host_pause_reaches_the_room() {
    let room = LocalRoom::new();
    let host = join(&room, "host", Role::Host);
    let viewer = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    host.participant
        .session()
        .share_clip(TaskRef::new("vid1", 0.0, 120.0))
        .unwrap();
    host.transport.play();
    settle().await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    host.transport.pause();
    settle().await;

    assert_eq!(viewer.transport.status(), TransportStatus::Paused);
    let drift = (host.transport.current_time() - viewer.transport.current_time()).abs();
    assert!(drift <= 1.0, "drift was {drift}");
}

#[tokio::test(start_paused = true)]
async fn late_joiner_converges_after_state_request() {
    let room = LocalRoom::new();
    let host = join(&room, "host", Role::Host);
    let viewer_a = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    host.participant
        .session()
        .share_clip(TaskRef::new("abc", 0.0, 120.0))
        .unwrap();
    host.transport.play();
    settle().await;

    // Five seconds of shared playback before anyone else shows up.
    tokio::time::sleep(Duration::from_secs(5)).await;

    let late = join(&room, "viewer-b", Role::Viewer);
    settle().await;
    assert_eq!(late.transport.status(), TransportStatus::Unstarted);

    late.participant.request_state();
    settle().await;

    assert_eq!(late.transport.clip_id().as_deref(), Some("abc"));
    assert_eq!(late.transport.status(), TransportStatus::Playing);
    let drift = (late.transport.current_time() - host.transport.current_time()).abs();
    assert!(drift <= 1.0, "late joiner drift was {drift}");

    // The session layer converged too.
    let session = late.participant.session().current();
    assert_eq!(session.task.unwrap().clip_id, "abc");

    drop(viewer_a);
}

#[tokio::test(start_paused = true)]
async fn viewer_seek_drags_the_room_with_it() {
    let room = LocalRoom::new();
    let host = join(&room, "host", Role::Host);
    let viewer = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    host.participant
        .session()
        .share_clip(TaskRef::new("vid1", 0.0, 300.0))
        .unwrap();
    host.transport.play();
    settle().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Transport sync is peer-symmetric: a viewer scrub is broadcast just
    // like a host scrub.
    viewer.transport.seek(120.0);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let drift = (host.transport.current_time() - viewer.transport.current_time()).abs();
    assert!(drift <= 1.5, "drift after scrub was {drift}");
    assert!(host.transport.current_time() > 100.0);
}

#[tokio::test(start_paused = true)]
async fn viewer_share_attempt_touches_nobody() {
    let room = LocalRoom::new();
    let host = join(&room, "host", Role::Host);
    let viewer_a = join(&room, "viewer-a", Role::Viewer);
    let viewer_b = join(&room, "viewer-b", Role::Viewer);
    settle().await;

    viewer_a
        .participant
        .session()
        .share_clip(TaskRef::new("rogue", 0.0, 60.0))
        .unwrap();
    settle().await;

    assert!(host.participant.session().current().task.is_none());
    assert!(viewer_a.participant.session().current().task.is_none());
    assert!(viewer_b.participant.session().current().task.is_none());
    assert!(viewer_b.transport.clip_id().is_none());
}

#[tokio::test(start_paused = true)]
async fn clip_loops_locally_without_desync() {
    let room = LocalRoom::new();
    let host = join(&room, "host", Role::Host);
    let viewer = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    host.participant
        .session()
        .share_clip(TaskRef::new("loop", 0.0, 10.0))
        .unwrap();
    host.transport.play();
    settle().await;

    // Long enough for the 10 s clip to wrap at least twice.
    tokio::time::sleep(Duration::from_secs(25)).await;

    assert_eq!(host.transport.status(), TransportStatus::Playing);
    assert_eq!(viewer.transport.status(), TransportStatus::Playing);
    // Each participant loops on its own watchdog tick, so both stay inside
    // the clip window (plus at most one polling interval).
    assert!(host.transport.current_time() < 11.5);
    assert!(viewer.transport.current_time() < 11.5);
    let drift = (host.transport.current_time() - viewer.transport.current_time()).abs();
    assert!(drift <= 2.0, "post-loop drift was {drift}");
}

#[tokio::test(start_paused = true)]
async fn sharing_a_mid_clip_range_does_not_start_a_seek_storm() {
    use coview_protocol::{decode, SyncBody};

    let room = LocalRoom::new();
    let observer = room.join("observer");
    let mut observer_rx = observer.subscribe();

    let host = join(&room, "host", Role::Host);
    let viewer = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    // Cueing to 30 s jumps every transport well past the dead-band.
    host.participant
        .session()
        .share_clip(TaskRef::new("vid1", 30.0, 120.0))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(host.transport.current_time(), 30.0);
    assert_eq!(viewer.transport.current_time(), 30.0);

    let mut bodies = Vec::new();
    while let Ok(frame) = observer_rx.try_recv() {
        bodies.push(decode(&frame.payload).unwrap().body);
    }
    assert!(
        !bodies.iter().any(|b| matches!(b, SyncBody::Seek(_))),
        "the cue jump was rebroadcast as SEEK: {bodies:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn shut_down_participant_ignores_further_room_traffic() {
    let room = LocalRoom::new();
    let host = join(&room, "host", Role::Host);
    let mut viewer = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    host.participant
        .session()
        .share_clip(TaskRef::new("vid1", 0.0, 300.0))
        .unwrap();
    host.transport.play();
    settle().await;
    assert_eq!(viewer.transport.status(), TransportStatus::Playing);
    // Past the cue suppression window, so the scrub below is broadcast.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let applied_before = viewer
        .participant
        .counters()
        .applied
        .load(std::sync::atomic::Ordering::Relaxed);
    viewer.participant.shutdown();

    // Traffic and timer ticks after teardown must not reach the viewer.
    host.transport.seek(120.0);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(
        viewer
            .participant
            .counters()
            .applied
            .load(std::sync::atomic::Ordering::Relaxed),
        applied_before
    );
    assert!(host.transport.current_time() > 100.0);
    assert!(
        viewer.transport.current_time() < 10.0,
        "a torn-down participant still applied a remote seek"
    );
}

#[tokio::test(start_paused = true)]
async fn request_state_with_no_host_changes_nothing() {
    let room = LocalRoom::new();
    let viewer = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    viewer.participant.request_state();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(viewer.participant.session().current().task.is_none());
    assert_eq!(viewer.transport.status(), TransportStatus::Unstarted);
}

#[tokio::test(start_paused = true)]
async fn unknown_and_malformed_frames_are_survivable() {
    use bytes::Bytes;

    let room = LocalRoom::new();
    let host = join(&room, "host", Role::Host);
    let viewer = join(&room, "viewer-a", Role::Viewer);
    settle().await;

    let stranger = room.join("stranger");
    stranger
        .send(Bytes::from_static(
            br#"{"type":"UNKNOWN_FUTURE_TYPE","data":{"v":2},"timestamp":1}"#,
        ))
        .unwrap();
    stranger.send(Bytes::from_static(b"\xff\xfe not json")).unwrap();
    settle().await;

    assert_eq!(
        viewer
            .participant
            .counters()
            .dropped_malformed
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );

    // The room still works afterwards.
    host.participant
        .session()
        .share_clip(TaskRef::new("vid1", 0.0, 120.0))
        .unwrap();
    settle().await;
    assert_eq!(viewer.transport.clip_id().as_deref(), Some("vid1"));
}
