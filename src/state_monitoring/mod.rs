//! State monitoring queue
//!
//! Jobs on this queue only read: they take a snapshot of users, peer
//! health, clocks and sync metrics, and decide which secondaries need a
//! sync and which replica sets need to change. The decisions are handed
//! to the reconciliation queue as follow-up jobs.

mod errors;
mod find_potential_syncs;
mod find_replica_set_updates;
mod monitor;
mod queue;
mod types;

pub use errors::{MonitoringError, MonitoringResult};
pub use find_potential_syncs::{
    find_potential_syncs, FindPotentialSyncsProcessor, FindPotentialSyncsResult,
};
pub use find_replica_set_updates::{
    find_replica_set_updates, user_info_by_replica, FindReplicaSetUpdatesProcessor,
    FindReplicaSetUpdatesResult, ReplicaSetEvaluator, USER_BATCH_SIZE,
};
pub use monitor::{compute_peer_set, MonitorProcessor, MonitorResult};
pub use queue::{register_processors, MonitoringDeps};
pub use types::{
    sync_metric, user_info, ClockStatusMap, FindPotentialSyncsParams,
    FindReplicaSetUpdatesParams, MonitorJobParams, MonitoringSettings, PotentialSyncRequest,
    SecondarySyncMetricsMap, SyncSuccessMetric, SyncThresholds, UserInfo, UserReplicaRecord,
};
