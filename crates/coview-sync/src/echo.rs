//! Echo suppression for the broadcast feedback loop.
//!
//! Applying an inbound state change drives the local transport, which fires
//! the same observations a user action would. The gate marks a short window
//! during which the outbound path must treat transport activity as an echo,
//! not a new local change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Transient suppression flag shared by the inbound appliers, the range
/// enforcer, and the outbound detector.
pub struct EchoGate {
    epoch: Instant,
    open_until_ms: AtomicU64,
}

impl EchoGate {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            open_until_ms: AtomicU64::new(0),
        }
    }

    /// Open the gate for `window` from now. Overlapping opens extend, never
    /// shorten, the suppression deadline.
    pub fn open_for(&self, window: Duration) {
        let until = (self.epoch.elapsed() + window).as_millis() as u64;
        self.open_until_ms.fetch_max(until, Ordering::Relaxed);
    }

    pub fn is_open(&self) -> bool {
        (self.epoch.elapsed().as_millis() as u64) < self.open_until_ms.load(Ordering::Relaxed)
    }
}

impl Default for EchoGate {
    fn default() -> Self {
        Self::new()
    }
}
