//! monitor

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::{FindPotentialSyncsParams, FindReplicaSetUpdatesParams, MonitorJobParams, UserReplicaRecord};
use crate::observability::Logger;
use crate::queue::{EnqueueIntent, Job, JobName, JobOutcome, JobProcessor, ProcessFuture};

/// Distinct non-empty replica endpoints of `users`, excluding this node
pub fn compute_peer_set(users: &[UserReplicaRecord], this_node: &str) -> BTreeSet<String> {
    users
        .iter()
        .flat_map(|user| user.replicas())
        .map(|(endpoint, _)| endpoint)
        .filter(|endpoint| *endpoint != this_node)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorResult {
    pub num_users: usize,
    pub num_peers: usize,
    pub num_unhealthy_peers: usize,
}

/// Fans the monitor producer's output out into find-potential-syncs and
/// find-replica-set-updates
pub struct MonitorProcessor {
    this_node_endpoint: String,
}

impl MonitorProcessor {
    pub fn new(this_node_endpoint: impl Into<String>) -> Self {
        Self {
            this_node_endpoint: this_node_endpoint.into(),
        }
    }
}

impl JobProcessor for MonitorProcessor {
    fn process<'a>(&'a self, job: &'a Job) -> ProcessFuture<'a> {
        Box::pin(async move {
            let params: MonitorJobParams = job.payload_as()?;

            let peers = compute_peer_set(&params.users, &self.this_node_endpoint);
            let result = MonitorResult {
                num_users: params.users.len(),
                num_peers: peers.len(),
                num_unhealthy_peers: params.unhealthy_peers.len(),
            };
            let users = result.num_users.to_string();
            let peer_count = result.num_peers.to_string();
            let unhealthy = result.num_unhealthy_peers.to_string();
            Logger::info(
                "MONITOR_FANOUT",
                &[
                    ("users", users.as_str()),
                    ("peers", peer_count.as_str()),
                    ("unhealthy_peers", unhealthy.as_str()),
                ],
            );

            let find_syncs = FindPotentialSyncsParams {
                users: params.users.clone(),
                unhealthy_peers: params.unhealthy_peers.clone(),
                replica_set_nodes_to_user_clock_statuses_map: params
                    .replica_set_nodes_to_user_clock_statuses_map
                    .clone(),
                user_secondary_sync_metrics_map: params.user_secondary_sync_metrics_map.clone(),
            };
            let find_updates = FindReplicaSetUpdatesParams {
                users: params.users,
                unhealthy_peers: params.unhealthy_peers,
                replica_to_user_info_map: params.replica_set_nodes_to_user_clock_statuses_map,
                user_secondary_sync_metrics_map: params.user_secondary_sync_metrics_map,
            };

            let intents = vec![
                EnqueueIntent::new(JobName::FindPotentialSyncs, &find_syncs)?,
                EnqueueIntent::new(JobName::FindReplicaSetUpdates, &find_updates)?,
            ];
            Ok(JobOutcome::new(&result)?.with_intents(intents))
        })
    }
}
