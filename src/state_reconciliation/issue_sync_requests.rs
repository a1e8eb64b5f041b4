//! issue-sync-requests

use std::collections::HashSet;
use std::sync::Arc;

use super::sync_mode::{compute_sync_mode, SyncMode};
use super::types::{ExecuteSyncParams, IssueSyncRequestsParams, IssueSyncRequestsResult, SyncType};
use crate::observability::{Logger, MetricsRegistry, ObservationScope};
use crate::queue::{EnqueueIntent, Job, JobOutcome, JobProcessor, ProcessFuture};
use crate::sp_map::{EndpointMap, SpIdMapManager};
use crate::state_monitoring::{sync_metric, user_info, MonitoringSettings, UserInfo};

/// Re-checks every potential sync against the latest clock snapshot and
/// enqueues a recurring sync for each secondary that is behind this node.
///
/// At most one sync per (sync type, wallet, secondary) leaves a single job.
pub fn plan_sync_requests(
    params: &IssueSyncRequestsParams,
    settings: &MonitoringSettings,
    sp_map: &EndpointMap,
) -> (IssueSyncRequestsResult, Vec<EnqueueIntent>) {
    let this_node = settings.this_node_endpoint.as_str();
    let unhealthy: HashSet<&str> = params.unhealthy_peers.iter().map(String::as_str).collect();
    let clocks = &params.replica_set_nodes_to_user_clock_statuses_map;

    let mut result = IssueSyncRequestsResult::default();
    let mut intents = Vec::new();
    let mut seen: HashSet<(SyncType, &str, &str)> = HashSet::new();

    for request in &params.users {
        let user = &request.user;
        let secondary = request.endpoint.as_str();
        let wallet = user.wallet.as_str();

        let recorded_sp_id = user
            .secondaries()
            .into_iter()
            .find(|(endpoint, _)| *endpoint == secondary)
            .map(|(_, id)| id);
        let still_eligible = user.primary == this_node
            && recorded_sp_id.is_some()
            && recorded_sp_id == sp_map.get(secondary).copied()
            && !unhealthy.contains(secondary)
            && !settings
                .thresholds
                .is_unreliable(&sync_metric(&params.user_secondary_sync_metrics_map, wallet, secondary));
        if !still_eligible {
            result.num_skipped += 1;
            continue;
        }

        let Some(primary_info) = user_info(clocks, this_node, wallet) else {
            result.num_sync_requests_failed += 1;
            Logger::warn(
                "SYNC_PRIMARY_CLOCK_MISSING",
                &[("wallet", wallet), ("secondary", secondary)],
            );
            continue;
        };
        let missing = UserInfo::missing();
        let secondary_info = user_info(clocks, secondary, wallet).unwrap_or(&missing);

        match compute_sync_mode(primary_info, secondary_info) {
            SyncMode::None => result.num_up_to_date += 1,
            SyncMode::MergePrimaryAndSecondary => {
                result.num_merges_required += 1;
                let primary_clock = primary_info.clock.to_string();
                let secondary_clock = secondary_info.clock.to_string();
                Logger::warn(
                    "SYNC_MERGE_REQUIRED",
                    &[
                        ("wallet", wallet),
                        ("secondary", secondary),
                        ("primary_clock", primary_clock.as_str()),
                        ("secondary_clock", secondary_clock.as_str()),
                    ],
                );
            }
            SyncMode::SyncSecondaryFromPrimary => {
                if !seen.insert((SyncType::Recurring, wallet, secondary)) {
                    result.num_duplicate_syncs += 1;
                    continue;
                }
                let sync = ExecuteSyncParams::new(wallet, this_node, secondary, SyncType::Recurring);
                match EnqueueIntent::new(SyncType::Recurring.job_name(), &sync) {
                    Ok(intent) => {
                        intents.push(intent);
                        result.num_sync_requests_enqueued += 1;
                    }
                    Err(e) => {
                        result.num_sync_requests_failed += 1;
                        let err = e.to_string();
                        Logger::error(
                            "SYNC_ENQUEUE_FAILED",
                            &[("wallet", wallet), ("secondary", secondary), ("error", err.as_str())],
                        );
                    }
                }
            }
        }
    }

    (result, intents)
}

pub struct IssueSyncRequestsProcessor {
    settings: MonitoringSettings,
    sp_map: Arc<SpIdMapManager>,
    metrics: Arc<MetricsRegistry>,
}

impl IssueSyncRequestsProcessor {
    pub fn new(
        settings: MonitoringSettings,
        sp_map: Arc<SpIdMapManager>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            settings,
            sp_map,
            metrics,
        }
    }
}

impl JobProcessor for IssueSyncRequestsProcessor {
    fn process<'a>(&'a self, job: &'a Job) -> ProcessFuture<'a> {
        Box::pin(async move {
            let params: IssueSyncRequestsParams = job.payload_as()?;
            let count = params.users.len().to_string();
            let scope = ObservationScope::with_fields("ISSUE_SYNC_REQUESTS", &[("requests", count.as_str())]);

            let sp_map = self.sp_map.get();
            let (result, intents) = plan_sync_requests(&params, &self.settings, &sp_map);
            self.metrics.add_syncs_enqueued(result.num_sync_requests_enqueued);

            let enqueued = result.num_sync_requests_enqueued.to_string();
            let failed = result.num_sync_requests_failed.to_string();
            scope.complete_with_fields(&[
                ("enqueued", enqueued.as_str()),
                ("failed", failed.as_str()),
            ]);
            Ok(JobOutcome::new(&result)?.with_intents(intents))
        })
    }
}
