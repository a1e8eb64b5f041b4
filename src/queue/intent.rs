//! Processor outcomes and follow-up work

use serde::Serialize;
use serde_json::Value;

use super::errors::{QueueError, QueueResult};
use super::job::JobName;

/// A request to enqueue a follow-up job.
///
/// Processors never hold queue handles; they return intents and the
/// interfacer routes them to the owning queue.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueIntent {
    pub job_name: JobName,
    pub payload: Value,
}

impl EnqueueIntent {
    pub fn new<T: Serialize>(job_name: JobName, payload: &T) -> QueueResult<Self> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| QueueError::Internal(format!("unserializable payload: {}", e)))?;
        Ok(Self { job_name, payload })
    }
}

/// What a processor produced for one job
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub result: Value,
    pub jobs_to_enqueue: Vec<EnqueueIntent>,
}

impl JobOutcome {
    pub fn new<T: Serialize>(result: &T) -> QueueResult<Self> {
        let result = serde_json::to_value(result)
            .map_err(|e| QueueError::Internal(format!("unserializable result: {}", e)))?;
        Ok(Self {
            result,
            jobs_to_enqueue: Vec::new(),
        })
    }

    pub fn with_intents(mut self, intents: Vec<EnqueueIntent>) -> Self {
        self.jobs_to_enqueue = intents;
        self
    }
}
