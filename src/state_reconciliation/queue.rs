//! State reconciliation queue wiring

use std::sync::Arc;

use super::execute_sync::ExecuteSyncProcessor;
use super::issue_sync_requests::IssueSyncRequestsProcessor;
use super::types::SyncType;
use super::update_replica_sets::{ReplicaSetUpdaters, UpdateReplicaSetsProcessor};
use crate::config::QueueConcurrencyConfig;
use crate::observability::MetricsRegistry;
use crate::peers::SyncTransport;
use crate::queue::{JobName, JobQueueBuilder};
use crate::reconfig::ReconfigModeController;
use crate::sp_map::SpIdMapManager;
use crate::state_monitoring::MonitoringSettings;

/// Read-only handles the reconciliation processors are built from
pub struct ReconciliationDeps {
    pub settings: MonitoringSettings,
    pub sp_map: Arc<SpIdMapManager>,
    pub modes: Arc<ReconfigModeController>,
    pub transport: Arc<dyn SyncTransport>,
    pub updaters: ReplicaSetUpdaters,
    pub metrics: Arc<MetricsRegistry>,
    pub node_whitelist: Option<Vec<String>>,
}

/// Register issue-sync-requests, update-replica-sets and both execute-sync kinds
pub fn register_processors(
    builder: JobQueueBuilder,
    queues: &QueueConcurrencyConfig,
    deps: ReconciliationDeps,
) -> JobQueueBuilder {
    let issue = IssueSyncRequestsProcessor::new(
        deps.settings,
        deps.sp_map.clone(),
        deps.metrics.clone(),
    );
    let update = UpdateReplicaSetsProcessor::new(
        deps.sp_map,
        deps.modes,
        deps.updaters,
        deps.metrics.clone(),
    )
    .with_node_whitelist(deps.node_whitelist);
    let manual = ExecuteSyncProcessor::new(
        SyncType::Manual,
        deps.transport.clone(),
        deps.metrics.clone(),
    );
    let recurring = ExecuteSyncProcessor::new(SyncType::Recurring, deps.transport, deps.metrics);

    builder
        .processor(
            JobName::IssueSyncRequests,
            queues.settings_for(JobName::IssueSyncRequests),
            Arc::new(issue),
        )
        .processor(
            JobName::UpdateReplicaSets,
            queues.settings_for(JobName::UpdateReplicaSets),
            Arc::new(update),
        )
        .processor(
            JobName::ExecuteManualSync,
            queues.settings_for(JobName::ExecuteManualSync),
            Arc::new(manual),
        )
        .processor(
            JobName::ExecuteRecurringSync,
            queues.settings_for(JobName::ExecuteRecurringSync),
            Arc::new(recurring),
        )
}
