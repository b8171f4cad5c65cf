//! The room broadcast-channel seam and an in-memory room.
//!
//! The real channel is the call's reliable, at-least-once data channel; it
//! gives no cross-sender ordering and delivers nothing sent before a
//! participant joined. [`LocalRoom`] reproduces those semantics in-process
//! for tests and the demo binary.

use bytes::Bytes;
use coview_common::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

/// One frame received from the room, tagged with its author.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub payload: Bytes,
    pub sender_id: String,
}

/// Thin send/receive wrapper over the room's data channel.
///
/// `send` publishes to every current participant except the sender; local
/// echo is filtered by the channel, not by message handlers.
pub trait BroadcastChannel: Send + Sync {
    fn send(&self, payload: Bytes) -> Result<()>;
    fn subscribe(&self) -> mpsc::Receiver<InboundFrame>;
}

const ROOM_BUS_CAPACITY: usize = 256;
const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

/// In-memory room shared by a set of participants in one process.
pub struct LocalRoom {
    bus: broadcast::Sender<InboundFrame>,
}

impl LocalRoom {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(ROOM_BUS_CAPACITY);
        Self { bus }
    }

    /// Join the room under a participant id. Frames published before the
    /// returned channel subscribes are never delivered to it.
    pub fn join(&self, participant_id: impl Into<String>) -> RoomChannel {
        RoomChannel {
            id: participant_id.into(),
            bus: self.bus.clone(),
        }
    }
}

impl Default for LocalRoom {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant's handle on a [`LocalRoom`].
pub struct RoomChannel {
    id: String,
    bus: broadcast::Sender<InboundFrame>,
}

impl RoomChannel {
    pub fn participant_id(&self) -> &str {
        &self.id
    }
}

impl BroadcastChannel for RoomChannel {
    fn send(&self, payload: Bytes) -> Result<()> {
        // A send into an empty room is not an error; there is simply nobody
        // to deliver to yet.
        let _ = self.bus.send(InboundFrame {
            payload,
            sender_id: self.id.clone(),
        });
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<InboundFrame> {
        let mut bus_rx = self.bus.subscribe();
        let own_id = self.id.clone();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        tokio::spawn(async move {
            loop {
                match bus_rx.recv().await {
                    Ok(frame) if frame.sender_id == own_id => continue,
                    Ok(frame) => {
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(participant = %own_id, skipped, "room subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        rx
    }
}
