//! Queue event hooks
//!
//! Observers are registered when a queue is built and are called from the
//! worker that finished the job. Hooks must not block.

use std::sync::Arc;

use serde_json::Value;

use super::job::Job;
use crate::observability::{Logger, MetricsRegistry};

pub trait QueueObserver: Send + Sync {
    fn on_enqueued(&self, _job: &Job) {}
    fn on_completed(&self, _job: &Job, _result: &Value) {}
    fn on_failed(&self, _job: &Job, _error: &str) {}
    /// Stalled jobs are also reported through `on_failed`
    fn on_stalled(&self, _job: &Job) {}
}

/// Logs every terminal job transition
pub struct LoggingObserver;

impl QueueObserver for LoggingObserver {
    fn on_completed(&self, job: &Job, _result: &Value) {
        let id = job.id.to_string();
        Logger::info(
            "JOB_COMPLETED",
            &[
                ("queue", job.queue_name.as_str()),
                ("job_name", job.job_name.as_str()),
                ("job_id", id.as_str()),
            ],
        );
    }

    fn on_failed(&self, job: &Job, error: &str) {
        let id = job.id.to_string();
        Logger::error(
            "JOB_FAILED",
            &[
                ("queue", job.queue_name.as_str()),
                ("job_name", job.job_name.as_str()),
                ("job_id", id.as_str()),
                ("error", error),
            ],
        );
    }

    fn on_stalled(&self, job: &Job) {
        let id = job.id.to_string();
        let attempts = job.attempts.to_string();
        Logger::error(
            "JOB_STALLED",
            &[
                ("queue", job.queue_name.as_str()),
                ("job_name", job.job_name.as_str()),
                ("job_id", id.as_str()),
                ("attempts", attempts.as_str()),
            ],
        );
    }
}

/// Feeds the job counters
pub struct MetricsObserver {
    metrics: Arc<MetricsRegistry>,
}

impl MetricsObserver {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }
}

impl QueueObserver for MetricsObserver {
    fn on_enqueued(&self, _job: &Job) {
        self.metrics.increment_jobs_enqueued();
    }

    fn on_completed(&self, _job: &Job, _result: &Value) {
        self.metrics.increment_jobs_completed();
    }

    fn on_failed(&self, _job: &Job, _error: &str) {
        self.metrics.increment_jobs_failed();
    }

    fn on_stalled(&self, _job: &Job) {
        self.metrics.increment_jobs_stalled();
    }
}

/// Keeps every finished job for assertions
#[cfg(test)]
#[derive(Default)]
pub(crate) struct FinishedJobs {
    jobs: std::sync::Mutex<Vec<Job>>,
}

#[cfg(test)]
impl FinishedJobs {
    pub(crate) fn all(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    pub(crate) fn get(&self, id: &uuid::Uuid) -> Option<Job> {
        self.all().into_iter().find(|job| &job.id == id)
    }
}

#[cfg(test)]
impl QueueObserver for FinishedJobs {
    fn on_completed(&self, job: &Job, _result: &Value) {
        self.jobs.lock().unwrap().push(job.clone());
    }

    fn on_failed(&self, job: &Job, _error: &str) {
        self.jobs.lock().unwrap().push(job.clone());
    }
}
