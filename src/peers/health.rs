//! Primary liveness tracking with a grace period

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use super::{HealthProber, NodeHealthCheck, PeerFuture};
use crate::config::MAX_PRIMARY_GRACE_SECS;
use crate::observability::Logger;

/// Gives primaries the benefit of the doubt.
///
/// A primary whose health check fails is still reported healthy until it
/// has been failing continuously for the configured grace period. A single
/// passing check clears its failure record.
pub struct PrimaryHealthTracker {
    check: Arc<dyn NodeHealthCheck>,
    grace_period: Duration,
    unhealthy_since: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl PrimaryHealthTracker {
    pub fn new(check: Arc<dyn NodeHealthCheck>, grace_period_secs: u64) -> Self {
        Self {
            check,
            grace_period: Duration::seconds(grace_period_secs.min(MAX_PRIMARY_GRACE_SECS) as i64),
            unhealthy_since: Mutex::new(HashMap::new()),
        }
    }

    /// Decide health for `endpoint` given a fresh probe result observed at `now`
    fn record_probe(&self, endpoint: &str, healthy: bool, now: DateTime<Utc>) -> bool {
        let mut unhealthy_since = match self.unhealthy_since.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if healthy {
            unhealthy_since.remove(endpoint);
            return true;
        }

        let since = *unhealthy_since.entry(endpoint.to_string()).or_insert(now);
        let within_grace = now - since < self.grace_period;
        if within_grace {
            let since_str = since.to_rfc3339();
            Logger::warn(
                "PRIMARY_UNHEALTHY_IN_GRACE_PERIOD",
                &[("endpoint", endpoint), ("unhealthy_since", since_str.as_str())],
            );
        }
        within_grace
    }
}

impl HealthProber for PrimaryHealthTracker {
    fn is_primary_healthy<'a>(&'a self, endpoint: &'a str) -> PeerFuture<'a, bool> {
        Box::pin(async move {
            let healthy = match self.check.is_node_healthy(endpoint).await {
                Ok(healthy) => healthy,
                Err(e) => {
                    let err = e.to_string();
                    Logger::warn(
                        "PRIMARY_HEALTH_CHECK_ERROR",
                        &[("endpoint", endpoint), ("error", err.as_str())],
                    );
                    false
                }
            };
            Ok(self.record_probe(endpoint, healthy, Utc::now()))
        })
    }
}
