//! Job records and job kinds

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::{QueueError, QueueResult};

/// The two named queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    #[serde(rename = "state-monitoring-queue")]
    StateMonitoring,
    #[serde(rename = "state-reconciliation-queue")]
    StateReconciliation,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::StateMonitoring => "state-monitoring-queue",
            QueueName::StateReconciliation => "state-reconciliation-queue",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every job kind, each owned by exactly one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobName {
    Monitor,
    FindPotentialSyncs,
    FindReplicaSetUpdates,
    IssueSyncRequests,
    UpdateReplicaSets,
    ExecuteManualSync,
    ExecuteRecurringSync,
}

impl JobName {
    pub const ALL: [JobName; 7] = [
        JobName::Monitor,
        JobName::FindPotentialSyncs,
        JobName::FindReplicaSetUpdates,
        JobName::IssueSyncRequests,
        JobName::UpdateReplicaSets,
        JobName::ExecuteManualSync,
        JobName::ExecuteRecurringSync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::Monitor => "monitor",
            JobName::FindPotentialSyncs => "find-potential-syncs",
            JobName::FindReplicaSetUpdates => "find-replica-set-updates",
            JobName::IssueSyncRequests => "issue-sync-requests",
            JobName::UpdateReplicaSets => "update-replica-sets",
            JobName::ExecuteManualSync => "execute-manual-sync",
            JobName::ExecuteRecurringSync => "execute-recurring-sync",
        }
    }

    pub fn parse(name: &str) -> Option<JobName> {
        Self::ALL.iter().copied().find(|job| job.as_str() == name)
    }

    /// Queue that processes this kind
    pub fn queue(&self) -> QueueName {
        match self {
            JobName::Monitor | JobName::FindPotentialSyncs | JobName::FindReplicaSetUpdates => {
                QueueName::StateMonitoring
            }
            JobName::IssueSyncRequests
            | JobName::UpdateReplicaSets
            | JobName::ExecuteManualSync
            | JobName::ExecuteRecurringSync => QueueName::StateReconciliation,
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    /// Terminal. Includes stalled jobs, which are never retried.
    Failed,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// A stored job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub queue_name: QueueName,
    pub job_name: JobName,
    pub payload: Value,
    pub attempts: u32,
    pub state: JobState,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(job_name: JobName, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue_name: job_name.queue(),
            job_name,
            payload,
            attempts: 0,
            state: JobState::Waiting,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Deserialize the payload; a missing or ill-shaped field fails the job
    pub fn payload_as<T: DeserializeOwned>(&self) -> QueueResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            QueueError::InvalidPayload(format!("{} payload: {}", self.job_name, e))
        })
    }

    pub(crate) fn activate(&mut self) {
        self.state = JobState::Active;
        self.attempts += 1;
    }

    pub(crate) fn complete(&mut self, result: Value) {
        self.state = JobState::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_names_map_to_queues() {
        let monitoring: Vec<_> = JobName::ALL
            .iter()
            .filter(|j| j.queue() == QueueName::StateMonitoring)
            .collect();
        assert_eq!(monitoring.len(), 3);
        assert_eq!(
            JobName::UpdateReplicaSets.queue(),
            QueueName::StateReconciliation
        );
    }

    #[test]
    fn test_job_name_parse_and_serde_agree() {
        for job in JobName::ALL {
            assert_eq!(JobName::parse(job.as_str()), Some(job));
            let json = serde_json::to_string(&job).unwrap();
            assert_eq!(json, format!("\"{}\"", job.as_str()));
        }
        assert_eq!(JobName::parse("unknown"), None);
    }

    #[test]
    fn test_payload_as_reports_shape_errors() {
        #[derive(Debug, serde::Deserialize)]
        struct Params {
            #[allow(dead_code)]
            users: Vec<String>,
        }

        let ok = Job::new(JobName::Monitor, json!({"users": ["a"]}));
        assert!(ok.payload_as::<Params>().is_ok());

        let missing = Job::new(JobName::Monitor, json!({}));
        let err = missing.payload_as::<Params>().unwrap_err();
        assert!(matches!(err, QueueError::InvalidPayload(_)));
        assert!(err.to_string().contains("monitor"));

        let wrong_shape = Job::new(JobName::Monitor, json!({"users": "a"}));
        assert!(wrong_shape.payload_as::<Params>().is_err());
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new(JobName::Monitor, json!({}));
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.queue_name, QueueName::StateMonitoring);

        job.activate();
        assert_eq!(job.attempts, 1);
        assert!(!job.state.is_finished());

        job.complete(json!({"ok": true}));
        assert_eq!(job.state, JobState::Completed);
        assert!(job.finished_at.is_some());
    }
}
