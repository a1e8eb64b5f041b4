//! Reconciliation job payloads and results

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::queue::JobName;
use crate::reconfig::ReconfigMode;
use crate::state_monitoring::{
    ClockStatusMap, PotentialSyncRequest, SecondarySyncMetricsMap, UserInfo, UserReplicaRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncType {
    #[serde(rename = "RECURRING")]
    Recurring,
    #[serde(rename = "MANUAL")]
    Manual,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Recurring => "RECURRING",
            SyncType::Manual => "MANUAL",
        }
    }

    /// Job kind that executes syncs of this type
    pub fn job_name(&self) -> JobName {
        match self {
            SyncType::Recurring => JobName::ExecuteRecurringSync,
            SyncType::Manual => JobName::ExecuteManualSync,
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a sync request, as the secondary's `/sync` route expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequestData {
    #[serde(default)]
    pub wallet: Vec<String>,
    #[serde(default)]
    pub creator_node_endpoint: String,
    pub sync_type: SyncType,
}

/// A fully described sync request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequestParameters {
    #[serde(rename = "baseURL", default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub data: SyncRequestData,
}

fn default_method() -> String {
    "post".to_string()
}

impl SyncRequestParameters {
    /// Ask `secondary` to sync `wallet` from `primary`
    pub fn for_secondary(wallet: &str, primary: &str, secondary: &str, sync_type: SyncType) -> Self {
        Self {
            base_url: Some(secondary.to_string()),
            url: "/sync".to_string(),
            method: default_method(),
            data: SyncRequestData {
                wallet: vec![wallet.to_string()],
                creator_node_endpoint: primary.to_string(),
                sync_type,
            },
        }
    }
}

/// Payload of execute-manual-sync and execute-recurring-sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSyncParams {
    pub sync_type: SyncType,
    pub sync_request_parameters: SyncRequestParameters,
}

impl ExecuteSyncParams {
    pub fn new(wallet: &str, primary: &str, secondary: &str, sync_type: SyncType) -> Self {
        Self {
            sync_type,
            sync_request_parameters: SyncRequestParameters::for_secondary(
                wallet, primary, secondary, sync_type,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorBody {
    pub message: String,
}

/// `{}` on success, `{"error": {"message": ..}}` on failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSyncResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncErrorBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSyncRequestsParams {
    pub users: Vec<PotentialSyncRequest>,
    pub unhealthy_peers: Vec<String>,
    pub user_secondary_sync_metrics_map: SecondarySyncMetricsMap,
    pub replica_set_nodes_to_user_clock_statuses_map: ClockStatusMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSyncRequestsResult {
    /// Syncs handed to the interfacer; a later routing failure is counted
    /// in the `intentsUnrouted` metric instead of here
    pub num_sync_requests_enqueued: u64,
    pub num_sync_requests_failed: u64,
    pub num_duplicate_syncs: u64,
    pub num_merges_required: u64,
    pub num_up_to_date: u64,
    /// Dropped on re-check: unhealthy, unreliable or no longer ours
    pub num_skipped: u64,
}

/// One user whose replica set needs to change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReplicaSetsParams {
    #[serde(flatten)]
    pub user: UserReplicaRecord,
    pub unhealthy_replicas: Vec<String>,
    /// This user's info on each of its replicas
    pub replica_to_user_info_map: HashMap<String, UserInfo>,
}

/// Replica set chosen to replace the current one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReplicaSet {
    pub new_primary: Option<String>,
    pub new_secondary1: Option<String>,
    pub new_secondary2: Option<String>,
    pub issue_reconfig: bool,
    pub reconfig_type: Option<ReconfigMode>,
}

impl NewReplicaSet {
    pub fn no_reconfig() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReplicaSetsResult {
    pub error_msg: String,
    pub issued_reconfig: bool,
    pub new_replica_set: NewReplicaSet,
    pub healthy_nodes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_request_wire_format() {
        let params =
            SyncRequestParameters::for_secondary("0xabc", "http://cn1.co", "http://cn2.co", SyncType::Recurring);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            json!({
                "baseURL": "http://cn2.co",
                "url": "/sync",
                "method": "post",
                "data": {
                    "wallet": ["0xabc"],
                    "creator_node_endpoint": "http://cn1.co",
                    "sync_type": "RECURRING"
                }
            })
        );
    }

    #[test]
    fn test_sync_type_routes_to_job() {
        assert_eq!(SyncType::Manual.job_name(), JobName::ExecuteManualSync);
        assert_eq!(SyncType::Recurring.job_name(), JobName::ExecuteRecurringSync);
    }

    #[test]
    fn test_execute_sync_result_shapes() {
        assert_eq!(
            serde_json::to_value(ExecuteSyncResult::default()).unwrap(),
            json!({})
        );
        let failed = ExecuteSyncResult {
            error: Some(SyncErrorBody {
                message: "boom".into(),
            }),
        };
        assert_eq!(
            serde_json::to_value(failed).unwrap(),
            json!({"error": {"message": "boom"}})
        );
    }
}
