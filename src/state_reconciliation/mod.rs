//! State reconciliation queue
//!
//! Acts on what monitoring decided:
//!
//! - **issue-sync-requests**: final clock comparison, then one recurring
//!   sync per secondary that is behind this node
//! - **update-replica-sets**: picks and writes a new replica set for one
//!   user, then syncs the new secondaries
//! - **execute-manual-sync / execute-recurring-sync**: issue one sync
//!   request; failures are returned, not thrown

mod errors;
mod execute_sync;
mod issue_sync_requests;
mod queue;
mod replica_selection;
mod sync_mode;
mod types;
mod update_replica_sets;

pub use errors::{ReconciliationError, ReconciliationResult};
pub use execute_sync::{validate_sync_request, ExecuteSyncProcessor};
pub use issue_sync_requests::{plan_sync_requests, IssueSyncRequestsProcessor};
pub use queue::{register_processors, ReconciliationDeps};
pub use replica_selection::{
    determine_new_replica_set, select_random_replica_set_nodes,
    MAX_SELECT_NEW_REPLICA_SET_ATTEMPTS,
};
pub use sync_mode::{compute_sync_mode, SyncMode};
pub use types::{
    ExecuteSyncParams, ExecuteSyncResult, IssueSyncRequestsParams, IssueSyncRequestsResult,
    NewReplicaSet, SyncErrorBody, SyncRequestData, SyncRequestParameters, SyncType,
    UpdateReplicaSetsParams, UpdateReplicaSetsResult,
};
pub use update_replica_sets::{ReplicaSetUpdaters, UpdateReplicaSetsProcessor};
