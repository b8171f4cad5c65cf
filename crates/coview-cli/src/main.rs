//! Coview CLI: run a scripted sync session against simulated transports.
//!
//! Useful for eyeballing the protocol without a real call: every participant
//! runs the full controller stack over an in-memory room channel.

#![forbid(unsafe_code)]

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use coview_protocol::{Role, TaskRef};
use coview_sync::{
    BroadcastChannel, LocalRoom, MediaTransport, Participant, SimulatedTransport,
};
use tracing::info;

const DEFAULT_VIEWERS: usize = 2;
const DEFAULT_CLIP_ID: &str = "demo-clip";
const DEFAULT_CLIP_END_SEC: f64 = 120.0;

#[derive(Parser, Debug)]
#[command(name = "coview")]
#[command(about = "Coview sync demo tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scripted share/play/scrub/late-join session in-process
    Simulate {
        /// Number of viewers present from the start
        #[arg(long, default_value_t = DEFAULT_VIEWERS)]
        viewers: usize,

        /// Clip id the host shares
        #[arg(long, default_value = DEFAULT_CLIP_ID)]
        clip: String,

        /// Clip loop end in seconds (loop start is 0)
        #[arg(long, default_value_t = DEFAULT_CLIP_END_SEC)]
        clip_end: f64,

        /// Seconds of playback before the host scrubs
        #[arg(long, default_value_t = 5)]
        play_for: u64,
    },

    /// Show version information
    Version,
}

struct Peer {
    name: String,
    participant: Participant,
    transport: Arc<SimulatedTransport>,
}

fn join_room(room: &LocalRoom, name: &str, role: Role) -> Peer {
    let transport = Arc::new(SimulatedTransport::new());
    transport.mark_ready();
    let media: Arc<dyn MediaTransport> = transport.clone();
    let channel: Arc<dyn BroadcastChannel> = Arc::new(room.join(name));
    Peer {
        name: name.to_string(),
        participant: Participant::spawn(name, role, media, channel),
        transport,
    }
}

fn report(peers: &[Peer]) {
    for peer in peers {
        let counters = peer.participant.counters();
        println!(
            "  {:<10} status={:?} position={:.2}s sent={} applied={}",
            peer.name,
            peer.transport.status(),
            peer.transport.current_time(),
            counters.sent.load(Ordering::Relaxed),
            counters.applied.load(Ordering::Relaxed),
        );
    }
}

async fn simulate(viewers: usize, clip: String, clip_end: f64, play_for: u64) -> Result<()> {
    let room = LocalRoom::new();
    let mut peers = vec![join_room(&room, "host", Role::Host)];
    for n in 0..viewers {
        peers.push(join_room(&room, &format!("viewer-{n}"), Role::Viewer));
    }

    info!(clip = %clip, "host shares the clip");
    peers[0]
        .participant
        .session()
        .share_clip(TaskRef::new(clip, 0.0, clip_end))?;
    peers[0].transport.play();

    tokio::time::sleep(Duration::from_secs(play_for)).await;
    println!("after {play_for}s of playback:");
    report(&peers);

    info!("host scrubs forward 30s");
    let target = peers[0].transport.current_time() + 30.0;
    peers[0].transport.seek(target.min(clip_end - 1.0));
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("after the scrub:");
    report(&peers);

    info!("a late viewer joins and requests state");
    let late = join_room(&room, "latecomer", Role::Viewer);
    late.participant.request_state();
    peers.push(late);
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("after the late join:");
    report(&peers);

    info!("host pauses");
    peers[0].transport.pause();
    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("after the pause:");
    report(&peers);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    coview_common::init_tracing();

    let args = Args::parse();
    match args.command {
        Command::Simulate {
            viewers,
            clip,
            clip_end,
            play_for,
        } => simulate(viewers, clip, clip_end, play_for).await,
        Command::Version => {
            println!("coview {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
