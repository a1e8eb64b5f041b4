//! Monitoring data model and job payloads

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One user's replica set assignment, as recorded when it was assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReplicaRecord {
    #[serde(alias = "walletAddress")]
    pub wallet: String,
    #[serde(alias = "user_id")]
    pub user_id: u64,
    pub primary: String,
    #[serde(default)]
    pub secondary1: String,
    #[serde(default)]
    pub secondary2: String,
    #[serde(default, alias = "primarySpID")]
    pub primary_sp_id: u64,
    #[serde(default, alias = "secondary1SpID")]
    pub secondary1_sp_id: u64,
    #[serde(default, alias = "secondary2SpID")]
    pub secondary2_sp_id: u64,
}

impl UserReplicaRecord {
    /// Non-empty secondaries with their recorded service-provider ids
    pub fn secondaries(&self) -> Vec<(&str, u64)> {
        [
            (self.secondary1.as_str(), self.secondary1_sp_id),
            (self.secondary2.as_str(), self.secondary2_sp_id),
        ]
        .into_iter()
        .filter(|(endpoint, _)| !endpoint.is_empty())
        .collect()
    }

    /// Non-empty replicas, primary first, with their recorded ids
    pub fn replicas(&self) -> Vec<(&str, u64)> {
        let mut replicas = Vec::with_capacity(3);
        if !self.primary.is_empty() {
            replicas.push((self.primary.as_str(), self.primary_sp_id));
        }
        replicas.extend(self.secondaries());
        replicas
    }
}

/// A user's data version on one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub clock: i64,
    #[serde(default)]
    pub files_hash: Option<String>,
}

impl UserInfo {
    /// `clock = -1`: the node holds no data for the user
    pub fn missing() -> Self {
        Self {
            clock: -1,
            files_hash: None,
        }
    }
}

/// `endpoint → wallet → UserInfo`
pub type ClockStatusMap = HashMap<String, HashMap<String, UserInfo>>;

/// Look up a user's info on a node
pub fn user_info<'a>(map: &'a ClockStatusMap, endpoint: &str, wallet: &str) -> Option<&'a UserInfo> {
    map.get(endpoint).and_then(|wallets| wallets.get(wallet))
}

/// Reliability of syncing one user to one secondary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSuccessMetric {
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
}

fn default_success_rate() -> f64 {
    1.0
}

impl Default for SyncSuccessMetric {
    fn default() -> Self {
        Self {
            success_rate: default_success_rate(),
            success_count: 0,
            failure_count: 0,
        }
    }
}

/// `wallet → secondary endpoint → metric`
pub type SecondarySyncMetricsMap = HashMap<String, HashMap<String, SyncSuccessMetric>>;

/// Metric for a wallet/secondary pair; absent means no history
pub fn sync_metric(map: &SecondarySyncMetricsMap, wallet: &str, secondary: &str) -> SyncSuccessMetric {
    map.get(wallet)
        .and_then(|secondaries| secondaries.get(secondary))
        .copied()
        .unwrap_or_default()
}

/// Reliability thresholds, shared by the sync check and the
/// unhealthy-secondary check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncThresholds {
    /// 0–1
    pub min_success_rate: f64,
    pub min_failed_sync_requests: u64,
}

impl SyncThresholds {
    /// Enough failures and too low a success rate
    pub fn is_unreliable(&self, metric: &SyncSuccessMetric) -> bool {
        metric.failure_count >= self.min_failed_sync_requests
            && metric.success_rate < self.min_success_rate
    }
}

/// Node identity and thresholds used by the monitoring jobs
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringSettings {
    pub this_node_endpoint: String,
    pub thresholds: SyncThresholds,
}

/// A secondary that should be brought up to date with this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotentialSyncRequest {
    #[serde(flatten)]
    pub user: UserReplicaRecord,
    /// Secondary to sync
    pub endpoint: String,
}

/// Output of the external monitor producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorJobParams {
    pub users: Vec<UserReplicaRecord>,
    pub unhealthy_peers: Vec<String>,
    pub replica_set_nodes_to_user_clock_statuses_map: ClockStatusMap,
    pub user_secondary_sync_metrics_map: SecondarySyncMetricsMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindPotentialSyncsParams {
    pub users: Vec<UserReplicaRecord>,
    pub unhealthy_peers: Vec<String>,
    pub replica_set_nodes_to_user_clock_statuses_map: ClockStatusMap,
    pub user_secondary_sync_metrics_map: SecondarySyncMetricsMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindReplicaSetUpdatesParams {
    pub users: Vec<UserReplicaRecord>,
    pub unhealthy_peers: Vec<String>,
    pub replica_to_user_info_map: ClockStatusMap,
    pub user_secondary_sync_metrics_map: SecondarySyncMetricsMap,
}
