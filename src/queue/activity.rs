//! Outstanding-work tracking across queues

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts work that has been handed to the runtime but not yet finished:
/// queued or running jobs plus follow-up intents not yet routed.
///
/// A job's intents are counted before the job itself is released, so the
/// count never touches zero while follow-up work is still in transit.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    pub fn end(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Resolves once nothing is outstanding
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}
