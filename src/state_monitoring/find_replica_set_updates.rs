//! find-replica-set-updates

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use super::errors::{MonitoringError, MonitoringResult};
use super::types::{
    sync_metric, user_info, ClockStatusMap, FindReplicaSetUpdatesParams, MonitoringSettings,
    UserInfo, UserReplicaRecord,
};
use crate::observability::{Logger, ObservationScope};
use crate::peers::HealthProber;
use crate::queue::{EnqueueIntent, Job, JobName, JobOutcome, JobProcessor, ProcessFuture};
use crate::sp_map::{EndpointMap, SpIdMapManager};
use crate::state_reconciliation::UpdateReplicaSetsParams;

/// Users evaluated together
pub const USER_BATCH_SIZE: usize = 500;

/// Decides which replicas of each user are unhealthy
pub struct ReplicaSetEvaluator<'a> {
    pub settings: &'a MonitoringSettings,
    pub sp_map: &'a EndpointMap,
    pub unhealthy_peers: HashSet<&'a str>,
    pub params: &'a FindReplicaSetUpdatesParams,
    pub health: &'a dyn HealthProber,
}

impl<'a> ReplicaSetEvaluator<'a> {
    pub fn new(
        settings: &'a MonitoringSettings,
        sp_map: &'a EndpointMap,
        params: &'a FindReplicaSetUpdatesParams,
        health: &'a dyn HealthProber,
    ) -> Self {
        Self {
            settings,
            sp_map,
            unhealthy_peers: params.unhealthy_peers.iter().map(String::as_str).collect(),
            params,
            health,
        }
    }

    fn sp_id_mismatch(&self, endpoint: &str, recorded: u64) -> bool {
        self.sp_map.get(endpoint) != Some(&recorded)
    }

    /// Unhealthy replicas of one user
    pub async fn evaluate_user(&self, user: &UserReplicaRecord) -> MonitoringResult<BTreeSet<String>> {
        let this_node = self.settings.this_node_endpoint.as_str();
        if user.primary.is_empty() {
            return Err(MonitoringError::InvalidUser {
                wallet: user.wallet.clone(),
                reason: "no primary".into(),
            });
        }

        let mut unhealthy = BTreeSet::new();

        if user.primary == this_node {
            for (secondary, recorded) in user.secondaries() {
                let metric =
                    sync_metric(&self.params.user_secondary_sync_metrics_map, &user.wallet, secondary);
                if self.sp_id_mismatch(secondary, recorded)
                    || self.unhealthy_peers.contains(secondary)
                    || self.settings.thresholds.is_unreliable(&metric)
                {
                    unhealthy.insert(secondary.to_string());
                }
            }
            return Ok(unhealthy);
        }

        for (replica, recorded) in user.replicas() {
            if replica == this_node {
                continue;
            }
            if self.sp_id_mismatch(replica, recorded) {
                unhealthy.insert(replica.to_string());
                continue;
            }
            if !self.unhealthy_peers.contains(replica) {
                continue;
            }
            // Primaries get a liveness re-check before being declared unhealthy
            if replica == user.primary && self.health.is_primary_healthy(replica).await? {
                continue;
            }
            unhealthy.insert(replica.to_string());
        }
        Ok(unhealthy)
    }
}

/// This user's info on each of its replicas, clock -1 where unknown
pub fn user_info_by_replica(user: &UserReplicaRecord, infos: &ClockStatusMap) -> HashMap<String, UserInfo> {
    user.replicas()
        .into_iter()
        .map(|(replica, _)| {
            let info = user_info(infos, replica, &user.wallet)
                .cloned()
                .unwrap_or_else(UserInfo::missing);
            (replica.to_string(), info)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindReplicaSetUpdatesResult {
    pub num_update_replica_set_ops: usize,
    pub num_users_failed: usize,
}

/// Evaluate every user in batches. A user whose evaluation fails is logged
/// and left out; the rest of its batch is unaffected.
pub async fn find_replica_set_updates(
    params: &FindReplicaSetUpdatesParams,
    settings: &MonitoringSettings,
    sp_map: &EndpointMap,
    health: &dyn HealthProber,
) -> (Vec<UpdateReplicaSetsParams>, FindReplicaSetUpdatesResult) {
    let evaluator = ReplicaSetEvaluator::new(settings, sp_map, params, health);
    let mut ops = Vec::new();
    let mut result = FindReplicaSetUpdatesResult::default();

    for batch in params.users.chunks(USER_BATCH_SIZE) {
        let outcomes = join_all(batch.iter().map(|user| evaluator.evaluate_user(user))).await;

        for (user, outcome) in batch.iter().zip(outcomes) {
            match outcome {
                Ok(unhealthy) if unhealthy.is_empty() => {}
                Ok(unhealthy) => ops.push(UpdateReplicaSetsParams {
                    user: user.clone(),
                    unhealthy_replicas: unhealthy.into_iter().collect(),
                    replica_to_user_info_map: user_info_by_replica(
                        user,
                        &params.replica_to_user_info_map,
                    ),
                }),
                Err(e) => {
                    result.num_users_failed += 1;
                    let err = e.to_string();
                    Logger::error(
                        "REPLICA_SET_EVALUATION_FAILED",
                        &[("wallet", user.wallet.as_str()), ("error", err.as_str())],
                    );
                }
            }
        }
    }

    result.num_update_replica_set_ops = ops.len();
    (ops, result)
}

pub struct FindReplicaSetUpdatesProcessor {
    settings: MonitoringSettings,
    sp_map: Arc<SpIdMapManager>,
    health: Arc<dyn HealthProber>,
}

impl FindReplicaSetUpdatesProcessor {
    pub fn new(
        settings: MonitoringSettings,
        sp_map: Arc<SpIdMapManager>,
        health: Arc<dyn HealthProber>,
    ) -> Self {
        Self {
            settings,
            sp_map,
            health,
        }
    }
}

impl JobProcessor for FindReplicaSetUpdatesProcessor {
    fn process<'a>(&'a self, job: &'a Job) -> ProcessFuture<'a> {
        Box::pin(async move {
            let params: FindReplicaSetUpdatesParams = job.payload_as()?;
            let users = params.users.len().to_string();
            let scope = ObservationScope::with_fields("FIND_REPLICA_SET_UPDATES", &[("users", users.as_str())]);

            let sp_map = self.sp_map.get();
            let (ops, result) =
                find_replica_set_updates(&params, &self.settings, &sp_map, self.health.as_ref()).await;

            let intents = ops
                .iter()
                .map(|op| EnqueueIntent::new(JobName::UpdateReplicaSets, op))
                .collect::<Result<Vec<_>, _>>()?;

            let num_ops = result.num_update_replica_set_ops.to_string();
            let failed = result.num_users_failed.to_string();
            scope.complete_with_fields(&[
                ("update_ops", num_ops.as_str()),
                ("users_failed", failed.as_str()),
            ]);
            Ok(JobOutcome::new(&result)?.with_intents(intents))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::{PeerError, PeerFuture};
    use crate::state_monitoring::{SyncSuccessMetric, SyncThresholds};

    const THIS: &str = "http://me.co";

    struct Prober {
        healthy: bool,
    }

    impl HealthProber for Prober {
        fn is_primary_healthy<'a>(&'a self, endpoint: &'a str) -> PeerFuture<'a, bool> {
            let healthy = self.healthy;
            Box::pin(async move {
                if endpoint == "http://broken.co" {
                    Err(PeerError::Unreachable(endpoint.into()))
                } else {
                    Ok(healthy)
                }
            })
        }
    }

    fn settings() -> MonitoringSettings {
        MonitoringSettings {
            this_node_endpoint: THIS.into(),
            thresholds: SyncThresholds {
                min_success_rate: 0.5,
                min_failed_sync_requests: 3,
            },
        }
    }

    fn sp_map() -> EndpointMap {
        [(THIS, 1), ("http://a.co", 2), ("http://b.co", 3), ("http://broken.co", 4)]
            .into_iter()
            .map(|(e, id)| (e.to_string(), id))
            .collect()
    }

    fn user(wallet: &str, primary: (&str, u64), s1: (&str, u64), s2: (&str, u64)) -> UserReplicaRecord {
        UserReplicaRecord {
            wallet: wallet.into(),
            user_id: 1,
            primary: primary.0.into(),
            secondary1: s1.0.into(),
            secondary2: s2.0.into(),
            primary_sp_id: primary.1,
            secondary1_sp_id: s1.1,
            secondary2_sp_id: s2.1,
        }
    }

    fn params(users: Vec<UserReplicaRecord>, unhealthy: &[&str]) -> FindReplicaSetUpdatesParams {
        FindReplicaSetUpdatesParams {
            users,
            unhealthy_peers: unhealthy.iter().map(|s| s.to_string()).collect(),
            replica_to_user_info_map: HashMap::new(),
            user_secondary_sync_metrics_map: HashMap::new(),
        }
    }

    async fn run(p: &FindReplicaSetUpdatesParams, healthy_primary: bool) -> (Vec<UpdateReplicaSetsParams>, FindReplicaSetUpdatesResult) {
        find_replica_set_updates(p, &settings(), &sp_map(), &Prober { healthy: healthy_primary }).await
    }

    #[tokio::test]
    async fn test_primary_perspective_marks_secondaries() {
        let mut p = params(
            vec![user("0x1", (THIS, 1), ("http://a.co", 2), ("http://b.co", 3))],
            &["http://a.co"],
        );
        let (ops, _) = run(&p, true).await;
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].unhealthy_replicas, vec!["http://a.co".to_string()]);

        // unreliable secondary
        p.unhealthy_peers.clear();
        p.user_secondary_sync_metrics_map.insert(
            "0x1".into(),
            HashMap::from([(
                "http://b.co".to_string(),
                SyncSuccessMetric {
                    success_rate: 0.0,
                    success_count: 0,
                    failure_count: 4,
                },
            )]),
        );
        let (ops, _) = run(&p, true).await;
        assert_eq!(ops[0].unhealthy_replicas, vec!["http://b.co".to_string()]);
    }

    #[tokio::test]
    async fn test_primary_perspective_sp_id_mismatch() {
        let p = params(
            vec![user("0x1", (THIS, 1), ("http://a.co", 7), ("http://b.co", 3))],
            &[],
        );
        let (ops, _) = run(&p, true).await;
        assert_eq!(ops[0].unhealthy_replicas, vec!["http://a.co".to_string()]);
    }

    #[tokio::test]
    async fn test_healthy_users_produce_no_ops() {
        let p = params(
            vec![user("0x1", (THIS, 1), ("http://a.co", 2), ("http://b.co", 3))],
            &[],
        );
        let (ops, result) = run(&p, true).await;
        assert!(ops.is_empty());
        assert_eq!(result, FindReplicaSetUpdatesResult::default());
    }

    #[tokio::test]
    async fn test_secondary_perspective_confirms_primary() {
        let p = params(
            vec![user("0x1", ("http://a.co", 2), (THIS, 1), ("http://b.co", 3))],
            &["http://a.co", "http://b.co"],
        );

        // prober says the primary is still fine
        let (ops, _) = run(&p, true).await;
        assert_eq!(ops[0].unhealthy_replicas, vec!["http://b.co".to_string()]);

        let (ops, _) = run(&p, false).await;
        assert_eq!(
            ops[0].unhealthy_replicas,
            vec!["http://a.co".to_string(), "http://b.co".to_string()]
        );
    }

    #[tokio::test]
    async fn test_secondary_perspective_never_marks_self() {
        let p = params(
            vec![user("0x1", ("http://a.co", 2), (THIS, 99), ("http://b.co", 3))],
            &[THIS],
        );
        let (ops, _) = run(&p, true).await;
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn test_info_map_filtered_and_defaulted() {
        let mut p = params(
            vec![user("0x1", (THIS, 1), ("http://a.co", 2), ("http://b.co", 3))],
            &["http://b.co"],
        );
        p.replica_to_user_info_map.insert(
            THIS.into(),
            HashMap::from([
                ("0x1".to_string(), UserInfo { clock: 8, files_hash: Some("h".into()) }),
                ("0x2".to_string(), UserInfo { clock: 1, files_hash: None }),
            ]),
        );
        p.replica_to_user_info_map
            .insert("http://elsewhere.co".into(), HashMap::new());

        let (ops, _) = run(&p, true).await;
        let infos = &ops[0].replica_to_user_info_map;
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[THIS].clock, 8);
        assert_eq!(infos["http://a.co"], UserInfo::missing());
    }

    #[tokio::test]
    async fn test_failed_user_excluded_from_batch() {
        let p = params(
            vec![
                user("0xbad", ("http://broken.co", 4), (THIS, 1), ("http://b.co", 3)),
                user("0xgood", (THIS, 1), ("http://a.co", 2), ("http://b.co", 3)),
                user("0xnoprimary", ("", 0), (THIS, 1), ("http://a.co", 2)),
            ],
            &["http://broken.co", "http://b.co"],
        );
        let (ops, result) = run(&p, true).await;
        assert_eq!(result.num_users_failed, 2);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].user.wallet, "0xgood");
    }
}
