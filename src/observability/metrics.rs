//! Operational counters for the state machine
//!
//! Counters only, monotonic, reset on process start.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of operational counters.
///
/// All counters use Relaxed atomics; values are observational only.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    jobs_enqueued: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_stalled: AtomicU64,
    intents_unrouted: AtomicU64,
    syncs_enqueued: AtomicU64,
    syncs_failed: AtomicU64,
    reconfigs_issued: AtomicU64,
    reconfigs_failed: AtomicU64,
    sp_map_refreshes: AtomicU64,
    sp_map_refresh_failures: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Queue metrics

    pub fn increment_jobs_enqueued(&self) {
        self.jobs_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_stalled(&self) {
        self.jobs_stalled.fetch_add(1, Ordering::Relaxed);
    }

    /// A follow-up job that no queue accepted
    pub fn increment_intents_unrouted(&self) {
        self.intents_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    // Reconciliation metrics

    /// Add syncs handed to the interfacer for the execute-sync queues.
    /// Ones it then fails to route also count toward `intents_unrouted`.
    pub fn add_syncs_enqueued(&self, count: u64) {
        self.syncs_enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_syncs_failed(&self) {
        self.syncs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconfigs_issued(&self) {
        self.reconfigs_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconfigs_failed(&self) {
        self.reconfigs_failed.fetch_add(1, Ordering::Relaxed);
    }

    // Map metrics

    pub fn increment_sp_map_refreshes(&self) {
        self.sp_map_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sp_map_refresh_failures(&self) {
        self.sp_map_refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_enqueued: self.jobs_enqueued.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_stalled: self.jobs_stalled.load(Ordering::Relaxed),
            intents_unrouted: self.intents_unrouted.load(Ordering::Relaxed),
            syncs_enqueued: self.syncs_enqueued.load(Ordering::Relaxed),
            syncs_failed: self.syncs_failed.load(Ordering::Relaxed),
            reconfigs_issued: self.reconfigs_issued.load(Ordering::Relaxed),
            reconfigs_failed: self.reconfigs_failed.load(Ordering::Relaxed),
            sp_map_refreshes: self.sp_map_refreshes.load(Ordering::Relaxed),
            sp_map_refresh_failures: self.sp_map_refresh_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub jobs_enqueued: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_stalled: u64,
    pub intents_unrouted: u64,
    pub syncs_enqueued: u64,
    pub syncs_failed: u64,
    pub reconfigs_issued: u64,
    pub reconfigs_failed: u64,
    pub sp_map_refreshes: u64,
    pub sp_map_refresh_failures: u64,
}
