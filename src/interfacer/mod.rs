//! Queue interfacer
//!
//! The only holder of live handles to both queues. Processors return
//! [`EnqueueIntent`]s; the dispatch loop routes each one to the queue that
//! owns its job kind.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::observability::{Logger, MetricsRegistry};
use crate::queue::{ActivityTracker, EnqueueIntent, JobName, JobQueue, QueueName, QueueResult};

pub struct QueueInterfacer {
    monitoring: Arc<JobQueue>,
    reconciliation: Arc<JobQueue>,
    activity: Arc<ActivityTracker>,
    metrics: Arc<MetricsRegistry>,
}

impl QueueInterfacer {
    pub fn new(
        monitoring: Arc<JobQueue>,
        reconciliation: Arc<JobQueue>,
        activity: Arc<ActivityTracker>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            monitoring,
            reconciliation,
            activity,
            metrics,
        }
    }

    /// Enqueue on the state monitoring queue; other job kinds are rejected
    pub fn add_state_monitoring_job(&self, job_name: JobName, data: Value) -> QueueResult<Uuid> {
        self.monitoring.add(job_name, data)
    }

    /// Enqueue on the state reconciliation queue; other job kinds are rejected
    pub fn add_state_reconciliation_job(&self, job_name: JobName, data: Value) -> QueueResult<Uuid> {
        self.reconciliation.add(job_name, data)
    }

    /// Enqueue on whichever queue owns the intent's job kind
    pub fn route(&self, intent: EnqueueIntent) -> QueueResult<Uuid> {
        match intent.job_name.queue() {
            QueueName::StateMonitoring => {
                self.add_state_monitoring_job(intent.job_name, intent.payload)
            }
            QueueName::StateReconciliation => {
                self.add_state_reconciliation_job(intent.job_name, intent.payload)
            }
        }
    }

    pub fn queue(&self, name: QueueName) -> &Arc<JobQueue> {
        match name {
            QueueName::StateMonitoring => &self.monitoring,
            QueueName::StateReconciliation => &self.reconciliation,
        }
    }

    /// Route intents until every sender is gone.
    ///
    /// Each intent was counted as outstanding by the lane that produced it;
    /// the count is released only after the follow-up job is enqueued.
    pub async fn run_dispatch(self: Arc<Self>, mut intents: mpsc::UnboundedReceiver<EnqueueIntent>) {
        while let Some(intent) = intents.recv().await {
            let job_name = intent.job_name;
            if let Err(e) = self.route(intent) {
                self.metrics.increment_intents_unrouted();
                let err = e.to_string();
                Logger::error(
                    "INTENT_ROUTING_FAILED",
                    &[("job_name", job_name.as_str()), ("error", err.as_str())],
                );
            }
            self.activity.end();
        }
    }

    /// Stop both queues' lanes
    pub fn close(&self) {
        self.monitoring.close();
        self.reconciliation.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueSettings;
    use crate::queue::{
        FinishedJobs, Job, JobOutcome, JobProcessor, JobState, JobStore, ProcessFuture, QueueError,
    };
    use serde_json::json;
    use std::time::Duration;

    struct Echo;

    impl JobProcessor for Echo {
        fn process<'a>(&'a self, job: &'a Job) -> ProcessFuture<'a> {
            Box::pin(async move { JobOutcome::new(&job.payload) })
        }
    }

    /// Monitor job that fans out into one find-potential-syncs and one
    /// issue-sync-requests job
    struct Fanout;

    impl JobProcessor for Fanout {
        fn process<'a>(&'a self, _job: &'a Job) -> ProcessFuture<'a> {
            Box::pin(async move {
                let intents = vec![
                    EnqueueIntent::new(JobName::FindPotentialSyncs, &json!({"n": 1}))?,
                    EnqueueIntent::new(JobName::IssueSyncRequests, &json!({"n": 2}))?,
                ];
                Ok(JobOutcome::new(&json!({}))?.with_intents(intents))
            })
        }
    }

    fn settings() -> QueueSettings {
        QueueSettings::new(1, 1_000)
    }

    struct Harness {
        interfacer: Arc<QueueInterfacer>,
        finished: Arc<FinishedJobs>,
        activity: Arc<ActivityTracker>,
        metrics: Arc<MetricsRegistry>,
    }

    impl Harness {
        async fn wait(&self) {
            tokio::time::timeout(Duration::from_secs(5), self.activity.wait_idle())
                .await
                .unwrap();
        }

        fn finished_in(&self, queue: QueueName) -> Vec<Job> {
            self.finished
                .all()
                .into_iter()
                .filter(|job| job.queue_name == queue)
                .collect()
        }
    }

    fn build() -> Harness {
        let store = Arc::new(JobStore::in_memory());
        let activity = Arc::new(ActivityTracker::new());
        let finished = Arc::new(FinishedJobs::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let monitoring = JobQueue::builder(QueueName::StateMonitoring, store.clone())
            .processor(JobName::Monitor, settings(), Arc::new(Fanout))
            .processor(JobName::FindPotentialSyncs, settings(), Arc::new(Echo))
            .observer(finished.clone())
            .intents(tx.clone())
            .activity(activity.clone())
            .build()
            .unwrap();
        let reconciliation = JobQueue::builder(QueueName::StateReconciliation, store)
            .processor(JobName::IssueSyncRequests, settings(), Arc::new(Echo))
            .processor(JobName::UpdateReplicaSets, settings(), Arc::new(Orphaned))
            .observer(finished.clone())
            .intents(tx)
            .activity(activity.clone())
            .build()
            .unwrap();

        let metrics = Arc::new(MetricsRegistry::new());
        let interfacer = Arc::new(QueueInterfacer::new(
            Arc::new(monitoring),
            Arc::new(reconciliation),
            activity.clone(),
            metrics.clone(),
        ));
        tokio::spawn(interfacer.clone().run_dispatch(rx));
        Harness {
            interfacer,
            finished,
            activity,
            metrics,
        }
    }

    /// Asks for a sync no queue has a processor for
    struct Orphaned;

    impl JobProcessor for Orphaned {
        fn process<'a>(&'a self, _job: &'a Job) -> ProcessFuture<'a> {
            Box::pin(async move {
                let intent = EnqueueIntent::new(JobName::ExecuteManualSync, &json!({}))?;
                Ok(JobOutcome::new(&json!({}))?.with_intents(vec![intent]))
            })
        }
    }

    #[tokio::test]
    async fn test_rejects_job_for_other_queue() {
        let harness = build();
        let err = harness
            .interfacer
            .add_state_monitoring_job(JobName::IssueSyncRequests, json!({}))
            .unwrap_err();
        assert!(matches!(err, QueueError::WrongQueue { .. }));

        let err = harness
            .interfacer
            .add_state_reconciliation_job(JobName::Monitor, json!({}))
            .unwrap_err();
        assert!(matches!(err, QueueError::WrongQueue { .. }));
    }

    #[tokio::test]
    async fn test_intents_routed_to_owning_queue() {
        let harness = build();
        harness
            .interfacer
            .add_state_monitoring_job(JobName::Monitor, json!({}))
            .unwrap();
        harness.wait().await;

        let monitoring = harness.finished_in(QueueName::StateMonitoring);
        let reconciliation = harness.finished_in(QueueName::StateReconciliation);
        assert_eq!(monitoring.len(), 2);
        assert_eq!(reconciliation.len(), 1);
        assert_eq!(reconciliation[0].job_name, JobName::IssueSyncRequests);
        assert_eq!(reconciliation[0].state, JobState::Completed);
        assert_eq!(reconciliation[0].result, Some(json!({"n": 2})));
        assert_eq!(harness.metrics.snapshot().intents_unrouted, 0);
    }

    #[tokio::test]
    async fn test_route_without_processor_is_logged_not_fatal() {
        let harness = build();
        let err = harness
            .interfacer
            .route(EnqueueIntent::new(JobName::ExecuteManualSync, &json!({})).unwrap())
            .unwrap_err();
        assert!(matches!(err, QueueError::NoProcessor(_)));
        assert_eq!(harness.activity.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_unroutable_follow_up_is_counted() {
        let harness = build();
        harness
            .interfacer
            .add_state_reconciliation_job(JobName::UpdateReplicaSets, json!({}))
            .unwrap();
        harness.wait().await;

        assert_eq!(harness.metrics.snapshot().intents_unrouted, 1);
        assert_eq!(harness.finished.all().len(), 1);
        assert_eq!(harness.activity.outstanding(), 0);
    }
}
