//! update-replica-sets

use std::collections::HashSet;
use std::sync::Arc;

use super::errors::{ReconciliationError, ReconciliationResult};
use super::replica_selection::determine_new_replica_set;
use super::types::{ExecuteSyncParams, SyncType, UpdateReplicaSetsParams, UpdateReplicaSetsResult};
use crate::observability::{Logger, MetricsRegistry, ObservationScope};
use crate::peers::{NodeSelector, ReplicaClient, ReplicaSetWriter};
use crate::queue::{EnqueueIntent, Job, JobOutcome, JobProcessor, ProcessFuture};
use crate::reconfig::ReconfigModeController;
use crate::sp_map::SpIdMapManager;

/// Collaborators used while reconfiguring a replica set
pub struct ReplicaSetUpdaters {
    pub selector: Arc<dyn NodeSelector>,
    pub replicas: Arc<dyn ReplicaClient>,
    pub writer: Arc<dyn ReplicaSetWriter>,
}

/// Replaces unhealthy members of one user's replica set.
///
/// Every failure is caught into `errorMsg`; the job itself only fails when
/// its payload cannot be parsed.
pub struct UpdateReplicaSetsProcessor {
    sp_map: Arc<SpIdMapManager>,
    modes: Arc<ReconfigModeController>,
    updaters: ReplicaSetUpdaters,
    metrics: Arc<MetricsRegistry>,
    node_whitelist: Option<HashSet<String>>,
}

impl UpdateReplicaSetsProcessor {
    pub fn new(
        sp_map: Arc<SpIdMapManager>,
        modes: Arc<ReconfigModeController>,
        updaters: ReplicaSetUpdaters,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            sp_map,
            modes,
            updaters,
            metrics,
            node_whitelist: None,
        }
    }

    /// Only draw new replicas from `whitelist`
    pub fn with_node_whitelist(mut self, whitelist: Option<Vec<String>>) -> Self {
        self.node_whitelist = whitelist.map(|nodes| nodes.into_iter().collect());
        self
    }

    async fn reconfigure(
        &self,
        params: &UpdateReplicaSetsParams,
        result: &mut UpdateReplicaSetsResult,
    ) -> ReconciliationResult<Vec<EnqueueIntent>> {
        let user = &params.user;
        let mut healthy_nodes = self.updaters.selector.healthy_nodes().await?;
        if let Some(whitelist) = &self.node_whitelist {
            healthy_nodes.retain(|endpoint| whitelist.contains(endpoint));
        }
        result.healthy_nodes = healthy_nodes;
        if result.healthy_nodes.is_empty() {
            return Err(ReconciliationError::NoHealthyNodes);
        }

        let mut new_set = determine_new_replica_set(
            user,
            &params.unhealthy_replicas,
            &params.replica_to_user_info_map,
            &result.healthy_nodes,
            self.updaters.replicas.as_ref(),
        )
        .await?;
        let Some(mode) = new_set.reconfig_type else {
            result.new_replica_set = new_set;
            return Ok(Vec::new());
        };
        new_set.issue_reconfig = self.modes.is_enabled(mode);
        result.new_replica_set = new_set.clone();

        if !new_set.issue_reconfig {
            let highest = self.modes.snapshot().highest_enabled_reconfig_mode;
            Logger::info(
                "RECONFIG_MODE_NOT_ENABLED",
                &[
                    ("wallet", user.wallet.as_str()),
                    ("mode", mode.key()),
                    ("highest_enabled", highest.key()),
                ],
            );
            return Ok(Vec::new());
        }

        let primary = new_set.new_primary.clone().unwrap_or_default();
        let secondaries: Vec<String> = [&new_set.new_secondary1, &new_set.new_secondary2]
            .into_iter()
            .flatten()
            .filter(|endpoint| !endpoint.is_empty())
            .cloned()
            .collect();

        let sp_map = self.sp_map.get();
        let resolve = |endpoint: &str| {
            sp_map
                .get(endpoint)
                .copied()
                .ok_or_else(|| ReconciliationError::UnresolvedSpId(endpoint.to_string()))
        };
        let primary_sp_id = resolve(&primary)?;
        let secondary_sp_ids = secondaries
            .iter()
            .map(|endpoint| resolve(endpoint))
            .collect::<ReconciliationResult<Vec<u64>>>()?;

        self.updaters
            .writer
            .update_replica_set(user.user_id, primary_sp_id, &secondary_sp_ids)
            .await?;
        result.issued_reconfig = true;
        self.metrics.increment_reconfigs_issued();

        let mut intents = Vec::with_capacity(secondaries.len());
        for secondary in &secondaries {
            let sync = ExecuteSyncParams::new(&user.wallet, &primary, secondary, SyncType::Recurring);
            match EnqueueIntent::new(SyncType::Recurring.job_name(), &sync) {
                Ok(intent) => intents.push(intent),
                Err(e) => {
                    let err = e.to_string();
                    Logger::error(
                        "SYNC_ENQUEUE_FAILED",
                        &[
                            ("wallet", user.wallet.as_str()),
                            ("secondary", secondary.as_str()),
                            ("error", err.as_str()),
                        ],
                    );
                }
            }
        }
        self.metrics.add_syncs_enqueued(intents.len() as u64);
        Ok(intents)
    }
}

impl JobProcessor for UpdateReplicaSetsProcessor {
    fn process<'a>(&'a self, job: &'a Job) -> ProcessFuture<'a> {
        Box::pin(async move {
            let params: UpdateReplicaSetsParams = job.payload_as()?;
            let user_id = params.user.user_id.to_string();
            let unhealthy = params.unhealthy_replicas.join(",");
            let scope = ObservationScope::with_fields(
                "UPDATE_REPLICA_SET",
                &[
                    ("wallet", params.user.wallet.as_str()),
                    ("user_id", user_id.as_str()),
                    ("unhealthy_replicas", unhealthy.as_str()),
                ],
            );

            let mut result = UpdateReplicaSetsResult::default();
            let intents = match self.reconfigure(&params, &mut result).await {
                Ok(intents) => {
                    let issued = result.issued_reconfig.to_string();
                    scope.complete_with_fields(&[("issued_reconfig", issued.as_str())]);
                    intents
                }
                Err(e) => {
                    self.metrics.increment_reconfigs_failed();
                    result.error_msg = e.to_string();
                    scope.fail(&result.error_msg);
                    Vec::new()
                }
            };

            Ok(JobOutcome::new(&result)?.with_intents(intents))
        })
    }
}
