//! State monitoring queue wiring

use std::sync::Arc;

use super::find_potential_syncs::FindPotentialSyncsProcessor;
use super::find_replica_set_updates::FindReplicaSetUpdatesProcessor;
use super::monitor::MonitorProcessor;
use super::types::MonitoringSettings;
use crate::config::QueueConcurrencyConfig;
use crate::peers::HealthProber;
use crate::queue::{JobName, JobQueueBuilder};
use crate::sp_map::SpIdMapManager;

/// Read-only handles the monitoring processors are built from
pub struct MonitoringDeps {
    pub settings: MonitoringSettings,
    pub sp_map: Arc<SpIdMapManager>,
    pub health: Arc<dyn HealthProber>,
}

/// Register monitor, find-potential-syncs and find-replica-set-updates
pub fn register_processors(
    builder: JobQueueBuilder,
    queues: &QueueConcurrencyConfig,
    deps: MonitoringDeps,
) -> JobQueueBuilder {
    let monitor = MonitorProcessor::new(deps.settings.this_node_endpoint.clone());
    let find_syncs = FindPotentialSyncsProcessor::new(deps.settings.clone(), deps.sp_map.clone());
    let find_updates = FindReplicaSetUpdatesProcessor::new(deps.settings, deps.sp_map, deps.health);

    builder
        .processor(
            JobName::Monitor,
            queues.settings_for(JobName::Monitor),
            Arc::new(monitor),
        )
        .processor(
            JobName::FindPotentialSyncs,
            queues.settings_for(JobName::FindPotentialSyncs),
            Arc::new(find_syncs),
        )
        .processor(
            JobName::FindReplicaSetUpdates,
            queues.settings_for(JobName::FindReplicaSetUpdates),
            Arc::new(find_updates),
        )
}
