//! find-potential-syncs

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::{sync_metric, FindPotentialSyncsParams, MonitoringSettings, PotentialSyncRequest};
use crate::observability::Logger;
use crate::queue::{EnqueueIntent, Job, JobName, JobOutcome, JobProcessor, ProcessFuture};
use crate::sp_map::{EndpointMap, SpIdMapManager};
use crate::state_reconciliation::IssueSyncRequestsParams;

/// Secondaries of users whose primary is this node that are worth syncing.
///
/// A secondary is skipped when it is a known unhealthy peer, when its
/// current service-provider id differs from the one recorded for the user,
/// or when it has failed often enough with too low a success rate.
pub fn find_potential_syncs(
    params: &FindPotentialSyncsParams,
    settings: &MonitoringSettings,
    sp_map: &EndpointMap,
) -> Vec<PotentialSyncRequest> {
    let unhealthy: HashSet<&str> = params.unhealthy_peers.iter().map(String::as_str).collect();
    let mut requests = Vec::new();

    for user in params
        .users
        .iter()
        .filter(|user| user.primary == settings.this_node_endpoint)
    {
        for (secondary, recorded_sp_id) in user.secondaries() {
            if unhealthy.contains(secondary) {
                continue;
            }
            if sp_map.get(secondary) != Some(&recorded_sp_id) {
                continue;
            }
            let metric = sync_metric(&params.user_secondary_sync_metrics_map, &user.wallet, secondary);
            if settings.thresholds.is_unreliable(&metric) {
                continue;
            }
            requests.push(PotentialSyncRequest {
                user: user.clone(),
                endpoint: secondary.to_string(),
            });
        }
    }
    requests
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindPotentialSyncsResult {
    pub num_potential_syncs: usize,
}

pub struct FindPotentialSyncsProcessor {
    settings: MonitoringSettings,
    sp_map: Arc<SpIdMapManager>,
}

impl FindPotentialSyncsProcessor {
    pub fn new(settings: MonitoringSettings, sp_map: Arc<SpIdMapManager>) -> Self {
        Self { settings, sp_map }
    }
}

impl JobProcessor for FindPotentialSyncsProcessor {
    fn process<'a>(&'a self, job: &'a Job) -> ProcessFuture<'a> {
        Box::pin(async move {
            let params: FindPotentialSyncsParams = job.payload_as()?;
            let sp_map = self.sp_map.get();
            let potential = find_potential_syncs(&params, &self.settings, &sp_map);

            let result = FindPotentialSyncsResult {
                num_potential_syncs: potential.len(),
            };
            let count = result.num_potential_syncs.to_string();
            Logger::info("POTENTIAL_SYNCS_FOUND", &[("count", count.as_str())]);

            let mut intents = Vec::new();
            if !potential.is_empty() {
                let next = IssueSyncRequestsParams {
                    users: potential,
                    unhealthy_peers: params.unhealthy_peers,
                    user_secondary_sync_metrics_map: params.user_secondary_sync_metrics_map,
                    replica_set_nodes_to_user_clock_statuses_map: params
                        .replica_set_nodes_to_user_clock_statuses_map,
                };
                intents.push(EnqueueIntent::new(JobName::IssueSyncRequests, &next)?);
            }
            Ok(JobOutcome::new(&result)?.with_intents(intents))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_monitoring::{SyncSuccessMetric, SyncThresholds, UserReplicaRecord};
    use serde_json::json;
    use std::collections::HashMap;

    const THIS: &str = "http://me.co";

    fn settings() -> MonitoringSettings {
        MonitoringSettings {
            this_node_endpoint: THIS.into(),
            thresholds: SyncThresholds {
                min_success_rate: 0.9,
                min_failed_sync_requests: 3,
            },
        }
    }

    fn sp_map() -> EndpointMap {
        [(THIS, 1), ("http://s1.co", 2), ("http://s2.co", 3)]
            .into_iter()
            .map(|(e, id)| (e.to_string(), id))
            .collect()
    }

    fn user(primary: &str) -> UserReplicaRecord {
        UserReplicaRecord {
            wallet: "0xabc".into(),
            user_id: 1,
            primary: primary.into(),
            secondary1: "http://s1.co".into(),
            secondary2: "http://s2.co".into(),
            primary_sp_id: 1,
            secondary1_sp_id: 2,
            secondary2_sp_id: 3,
        }
    }

    fn params(users: Vec<UserReplicaRecord>) -> FindPotentialSyncsParams {
        FindPotentialSyncsParams {
            users,
            unhealthy_peers: vec![],
            replica_set_nodes_to_user_clock_statuses_map: HashMap::new(),
            user_secondary_sync_metrics_map: HashMap::new(),
        }
    }

    fn endpoints(requests: &[PotentialSyncRequest]) -> Vec<&str> {
        requests.iter().map(|r| r.endpoint.as_str()).collect()
    }

    #[test]
    fn test_both_secondaries_of_own_users() {
        let found = find_potential_syncs(&params(vec![user(THIS)]), &settings(), &sp_map());
        assert_eq!(endpoints(&found), vec!["http://s1.co", "http://s2.co"]);
    }

    #[test]
    fn test_users_of_other_primaries_ignored() {
        let found = find_potential_syncs(
            &params(vec![user("http://other.co")]),
            &settings(),
            &sp_map(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_unhealthy_peer_skipped() {
        let mut p = params(vec![user(THIS)]);
        p.unhealthy_peers = vec!["http://s1.co".into()];
        let found = find_potential_syncs(&p, &settings(), &sp_map());
        assert_eq!(endpoints(&found), vec!["http://s2.co"]);
    }

    #[test]
    fn test_sp_id_mismatch_skipped() {
        let mut map = sp_map();
        map.insert("http://s2.co".into(), 99);
        let found = find_potential_syncs(&params(vec![user(THIS)]), &settings(), &map);
        assert_eq!(endpoints(&found), vec!["http://s1.co"]);

        map.remove("http://s1.co");
        assert!(find_potential_syncs(&params(vec![user(THIS)]), &settings(), &map).is_empty());
    }

    #[test]
    fn test_unreliable_secondary_skipped() {
        let mut p = params(vec![user(THIS)]);
        p.user_secondary_sync_metrics_map.insert(
            "0xabc".into(),
            HashMap::from([(
                "http://s1.co".to_string(),
                SyncSuccessMetric {
                    success_rate: 0.5,
                    success_count: 5,
                    failure_count: 5,
                },
            )]),
        );
        let found = find_potential_syncs(&p, &settings(), &sp_map());
        assert_eq!(endpoints(&found), vec!["http://s2.co"]);
    }

    #[tokio::test]
    async fn test_processor_enqueues_issue_sync_requests() {
        let processor = FindPotentialSyncsProcessor::new(
            settings(),
            Arc::new(SpIdMapManager::with_map(sp_map())),
        );
        let job = Job::new(
            JobName::FindPotentialSyncs,
            serde_json::to_value(params(vec![user(THIS)])).unwrap(),
        );
        let outcome = processor.process(&job).await.unwrap();

        assert_eq!(outcome.result, json!({"numPotentialSyncs": 2}));
        assert_eq!(outcome.jobs_to_enqueue.len(), 1);
        assert_eq!(outcome.jobs_to_enqueue[0].job_name, JobName::IssueSyncRequests);
        assert_eq!(
            outcome.jobs_to_enqueue[0].payload["users"][0]["endpoint"],
            "http://s1.co"
        );
    }

    #[tokio::test]
    async fn test_processor_rejects_missing_fields() {
        let processor = FindPotentialSyncsProcessor::new(settings(), Arc::new(SpIdMapManager::new()));
        let job = Job::new(
            JobName::FindPotentialSyncs,
            json!({"users": [], "unhealthyPeers": []}),
        );
        assert!(processor.process(&job).await.is_err());
    }
}
