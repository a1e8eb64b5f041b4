//! Job runtime
//!
//! Two named queues share one [`JobStore`]. A queue owns one lane per job
//! kind; processors turn a job's payload into a result plus follow-up
//! [`EnqueueIntent`]s, which the runtime forwards to the interfacer.
//!
//! - `job`: job records, kinds and queue names
//! - `store` / `journal`: shared store with an optional checksummed journal
//! - `runtime`: lanes, concurrency, lock duration and stall handling
//! - `observer`: completed / failed / stalled hooks

mod activity;
mod errors;
mod intent;
mod job;
mod journal;
mod observer;
mod runtime;
mod store;

pub use activity::ActivityTracker;
pub use errors::{QueueError, QueueResult};
pub use intent::{EnqueueIntent, JobOutcome};
pub use job::{Job, JobName, JobState, QueueName};
pub use journal::{compute_checksum, verify_checksum, Journal, JournalRecord};
pub use observer::{LoggingObserver, MetricsObserver, QueueObserver};
#[cfg(test)]
pub(crate) use observer::FinishedJobs;
pub use runtime::{JobProcessor, JobQueue, JobQueueBuilder, ProcessFuture, MAX_STALLED_COUNT};
pub use store::{JobStore, COMPACT_MIN_RECORDS};
