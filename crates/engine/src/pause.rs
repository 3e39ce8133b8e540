//! Cooperative pause/resume signal shared between a controller and its fetcher workers (§4.4,
//! §9 design notes: a flag + notify, not a channel rendezvous).

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// An atomic flag paired with a `Notify` so parked workers wake promptly on resume, without the
/// deadlock risk of a channel send that nobody is receiving.
#[derive(Debug, Default)]
pub struct PauseController {
    paused: AtomicBool,
    notify: Notify,
}

impl PauseController {
    pub fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Parks the caller while paused. Called at every suspension point (§5): before a read and
    /// before a write. Creating the `Notified` future before the re-check closes the race where a
    /// `resume()` lands between the flag check and the await.
    pub async fn wait_if_paused(&self) {
        loop {
            if !self.is_paused() {
                return;
            }
            let notified = self.notify.notified();
            if !self.is_paused() {
                return;
            }
            notified.await;
        }
    }
}
