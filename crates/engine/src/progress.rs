//! Progress accounting cadence (§4.3): the controller's 4 Hz ticker interval, and the coarse
//! byte-boundary threshold workers use to keep per-chunk bars fluid between ticks.

use std::time::Duration;

/// The controller-owned accounting ticker runs at 4 Hz.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Workers opportunistically publish a progress event every 1 MiB, independent of the ticker.
pub const COARSE_EMIT_BYTES: u64 = 1_048_576;

/// Accumulates bytes for one chunk and reports when a coarse boundary has been crossed, so the
/// caller can decide to publish a progress event without tracking the math itself.
#[derive(Debug, Default)]
pub struct CoarseEmitter {
    accumulated: u64,
}

impl CoarseEmitter {
    pub fn new() -> Self {
        Self { accumulated: 0 }
    }

    /// Adds freshly-read bytes; returns `true` exactly when the running total crosses
    /// [`COARSE_EMIT_BYTES`], resetting the counter.
    pub fn add(&mut self, bytes: u64) -> bool {
        self.accumulated += bytes;
        if self.accumulated >= COARSE_EMIT_BYTES {
            self.accumulated = 0;
            true
        } else {
            false
        }
    }
}
