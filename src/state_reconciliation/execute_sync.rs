//! execute-manual-sync / execute-recurring-sync

use std::sync::Arc;

use super::errors::{ReconciliationError, ReconciliationResult};
use super::types::{ExecuteSyncParams, ExecuteSyncResult, SyncErrorBody, SyncRequestParameters, SyncType};
use crate::observability::{Logger, MetricsRegistry};
use crate::peers::SyncTransport;
use crate::queue::{Job, JobOutcome, JobProcessor, ProcessFuture};

/// Reject requests that cannot be sent
pub fn validate_sync_request(params: &SyncRequestParameters) -> ReconciliationResult<()> {
    let describe = || serde_json::to_string(params).unwrap_or_default();

    let has_base_url = params
        .base_url
        .as_deref()
        .map(|url| !url.is_empty())
        .unwrap_or(false);
    if !has_base_url || params.url.is_empty() || params.data.creator_node_endpoint.is_empty() {
        return Err(ReconciliationError::InvalidSyncData(describe()));
    }
    if params.data.wallet.is_empty() || params.data.wallet.iter().any(|w| w.is_empty()) {
        return Err(ReconciliationError::InvalidSyncWallets(describe()));
    }
    Ok(())
}

/// Issues exactly the described sync request.
///
/// A failed sync never fails the job: the error is logged and returned as
/// the job's result. Only an unparseable payload fails the job.
pub struct ExecuteSyncProcessor {
    sync_type: SyncType,
    transport: Arc<dyn SyncTransport>,
    metrics: Arc<MetricsRegistry>,
}

impl ExecuteSyncProcessor {
    pub fn new(
        sync_type: SyncType,
        transport: Arc<dyn SyncTransport>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            sync_type,
            transport,
            metrics,
        }
    }

    async fn execute(&self, params: &ExecuteSyncParams) -> ReconciliationResult<()> {
        validate_sync_request(&params.sync_request_parameters)?;
        self.transport.send(&params.sync_request_parameters).await?;
        Ok(())
    }
}

impl JobProcessor for ExecuteSyncProcessor {
    fn process<'a>(&'a self, job: &'a Job) -> ProcessFuture<'a> {
        Box::pin(async move {
            let params: ExecuteSyncParams = job.payload_as()?;
            let request = &params.sync_request_parameters;
            let wallet = request.data.wallet.join(",");
            let secondary = request.base_url.clone().unwrap_or_default();

            let result = match self.execute(&params).await {
                Ok(()) => {
                    Logger::info(
                        "SYNC_EXECUTED",
                        &[
                            ("sync_type", self.sync_type.as_str()),
                            ("wallet", wallet.as_str()),
                            ("secondary", secondary.as_str()),
                        ],
                    );
                    ExecuteSyncResult::default()
                }
                Err(e) => {
                    self.metrics.increment_syncs_failed();
                    let message = e.to_string();
                    Logger::error(
                        "SYNC_FAILED",
                        &[
                            ("sync_type", self.sync_type.as_str()),
                            ("wallet", wallet.as_str()),
                            ("secondary", secondary.as_str()),
                            ("error", message.as_str()),
                        ],
                    );
                    ExecuteSyncResult {
                        error: Some(SyncErrorBody { message }),
                    }
                }
            };
            JobOutcome::new(&result)
        })
    }
}
