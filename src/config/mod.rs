//! Service configuration
//!
//! Loaded once from a JSON file at startup. Every optional field has a
//! default; `validate` runs on load and rejects out-of-range values.
//!
//! ```json
//! {
//!   "thisContentNodeEndpoint": "http://cn1.co",
//!   "registryEndpoint": "http://registry.co",
//!   "highestReconfigMode": "ONE_SECONDARY",
//!   "queues": { "executeManualSync": { "concurrency": 20, "lockDurationMs": 300000 } }
//! }
//! ```

mod errors;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use errors::{ConfigError, ConfigResult};

use crate::queue::JobName;
use crate::reconfig::ReconfigMode;
use crate::state_monitoring::SyncThresholds;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineConfig {
    /// Identity of this node; decides primary vs secondary perspective
    pub this_content_node_endpoint: String,

    /// This node's own service-provider id (0 when unknown)
    #[serde(default)]
    pub sp_id: u64,

    /// Highest permitted reconfig mode key; unknown keys mean disabled
    #[serde(default = "default_highest_reconfig_mode")]
    pub highest_reconfig_mode: String,

    /// Percent (0–100) of successful syncs below which a secondary is unreliable
    #[serde(default = "default_min_success_percent")]
    pub minimum_secondary_user_sync_success_percent: f64,

    /// Failures required before the success rate is taken into account
    #[serde(default = "default_min_failed_sync_requests")]
    pub minimum_failed_sync_requests_before_reconfig: u64,

    /// Grace period for a failing primary
    #[serde(default = "default_max_seconds_primary_unhealthy")]
    pub max_number_seconds_primary_remains_unhealthy: u64,

    /// Periodic map refresh; absent = refresh at start only
    #[serde(default)]
    pub sp_map_refresh_interval_secs: Option<u64>,

    /// Base URL of the service-provider registry
    #[serde(default)]
    pub registry_endpoint: Option<String>,

    /// Job store target
    #[serde(default)]
    pub job_store: JobStoreConfig,

    /// Per-job-kind worker settings
    #[serde(default)]
    pub queues: QueueConcurrencyConfig,

    /// Timeout for every outbound peer request
    #[serde(default = "default_sync_request_timeout_ms")]
    pub sync_request_timeout_ms: u64,

    /// When set, new replicas are only drawn from these endpoints
    #[serde(default)]
    pub reconfig_node_whitelist: Option<Vec<String>>,
}

fn default_highest_reconfig_mode() -> String {
    ReconfigMode::ReconfigDisabled.key().to_string()
}
fn default_min_success_percent() -> f64 {
    50.0
}
fn default_min_failed_sync_requests() -> u64 {
    20
}
fn default_max_seconds_primary_unhealthy() -> u64 {
    600
}
fn default_sync_request_timeout_ms() -> u64 {
    30_000
}

/// Upper bound for `maxNumberSecondsPrimaryRemainsUnhealthy` (one year)
pub const MAX_PRIMARY_GRACE_SECS: u64 = 365 * 24 * 60 * 60;

/// Job store target. Without a path the store is memory-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Worker settings for a single job kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSettings {
    /// Maximum jobs of this kind processed at once
    pub concurrency: usize,
    /// A job running longer than this is stalled
    pub lock_duration_ms: u64,
}

impl QueueSettings {
    pub fn new(concurrency: usize, lock_duration_ms: u64) -> Self {
        Self {
            concurrency,
            lock_duration_ms,
        }
    }

    pub fn lock_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_duration_ms)
    }
}

const ONE_HOUR_MS: u64 = 60 * 60 * 1000;
const FIVE_MINUTES_MS: u64 = 5 * 60 * 1000;

fn default_singleton() -> QueueSettings {
    QueueSettings::new(1, ONE_HOUR_MS)
}
fn default_manual_sync() -> QueueSettings {
    QueueSettings::new(15, FIVE_MINUTES_MS)
}
fn default_recurring_sync() -> QueueSettings {
    QueueSettings::new(5, FIVE_MINUTES_MS)
}

/// Per-job-kind worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConcurrencyConfig {
    #[serde(default = "default_singleton")]
    pub monitor: QueueSettings,
    #[serde(default = "default_singleton")]
    pub find_potential_syncs: QueueSettings,
    #[serde(default = "default_singleton")]
    pub find_replica_set_updates: QueueSettings,
    #[serde(default = "default_singleton")]
    pub issue_sync_requests: QueueSettings,
    #[serde(default = "default_singleton")]
    pub update_replica_sets: QueueSettings,
    #[serde(default = "default_manual_sync")]
    pub execute_manual_sync: QueueSettings,
    #[serde(default = "default_recurring_sync")]
    pub execute_recurring_sync: QueueSettings,
}

impl Default for QueueConcurrencyConfig {
    fn default() -> Self {
        Self {
            monitor: default_singleton(),
            find_potential_syncs: default_singleton(),
            find_replica_set_updates: default_singleton(),
            issue_sync_requests: default_singleton(),
            update_replica_sets: default_singleton(),
            execute_manual_sync: default_manual_sync(),
            execute_recurring_sync: default_recurring_sync(),
        }
    }
}

impl QueueConcurrencyConfig {
    /// Settings for one job kind
    pub fn settings_for(&self, job_name: JobName) -> QueueSettings {
        match job_name {
            JobName::Monitor => self.monitor,
            JobName::FindPotentialSyncs => self.find_potential_syncs,
            JobName::FindReplicaSetUpdates => self.find_replica_set_updates,
            JobName::IssueSyncRequests => self.issue_sync_requests,
            JobName::UpdateReplicaSets => self.update_replica_sets,
            JobName::ExecuteManualSync => self.execute_manual_sync,
            JobName::ExecuteRecurringSync => self.execute_recurring_sync,
        }
    }
}

impl StateMachineConfig {
    /// Minimal configuration for `endpoint`, everything else defaulted
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            this_content_node_endpoint: endpoint.into(),
            sp_id: 0,
            highest_reconfig_mode: default_highest_reconfig_mode(),
            minimum_secondary_user_sync_success_percent: default_min_success_percent(),
            minimum_failed_sync_requests_before_reconfig: default_min_failed_sync_requests(),
            max_number_seconds_primary_remains_unhealthy: default_max_seconds_primary_unhealthy(),
            sp_map_refresh_interval_secs: None,
            registry_endpoint: None,
            job_store: JobStoreConfig::default(),
            queues: QueueConcurrencyConfig::default(),
            sync_request_timeout_ms: default_sync_request_timeout_ms(),
            reconfig_node_whitelist: None,
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: StateMachineConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        validate_endpoint(
            "thisContentNodeEndpoint",
            &self.this_content_node_endpoint,
        )?;
        if let Some(registry) = &self.registry_endpoint {
            validate_endpoint("registryEndpoint", registry)?;
        }

        let percent = self.minimum_secondary_user_sync_success_percent;
        if !(0.0..=100.0).contains(&percent) {
            return Err(ConfigError::invalid(
                "minimumSecondaryUserSyncSuccessPercent",
                format!("{} is outside 0-100", percent),
            ));
        }

        if self.max_number_seconds_primary_remains_unhealthy > MAX_PRIMARY_GRACE_SECS {
            return Err(ConfigError::invalid(
                "maxNumberSecondsPrimaryRemainsUnhealthy",
                format!("must be <= {}", MAX_PRIMARY_GRACE_SECS),
            ));
        }

        if let Some(whitelist) = &self.reconfig_node_whitelist {
            for endpoint in whitelist {
                validate_endpoint("reconfigNodeWhitelist", endpoint)?;
            }
        }

        if self.sp_map_refresh_interval_secs == Some(0) {
            return Err(ConfigError::invalid(
                "spMapRefreshIntervalSecs",
                "must be > 0 when set",
            ));
        }

        if self.sync_request_timeout_ms == 0 {
            return Err(ConfigError::invalid("syncRequestTimeoutMs", "must be > 0"));
        }

        for job_name in JobName::ALL {
            let settings = self.queues.settings_for(job_name);
            if settings.concurrency == 0 {
                return Err(ConfigError::invalid(
                    &format!("queues.{}.concurrency", job_name.as_str()),
                    "must be > 0",
                ));
            }
            if settings.lock_duration_ms == 0 {
                return Err(ConfigError::invalid(
                    &format!("queues.{}.lockDurationMs", job_name.as_str()),
                    "must be > 0",
                ));
            }
        }

        Ok(())
    }

    /// Configured highest reconfig mode, `None` when the key is unrecognized
    pub fn highest_reconfig_mode(&self) -> Option<ReconfigMode> {
        ReconfigMode::from_key(&self.highest_reconfig_mode)
    }

    /// Success percent stored as a rate in 0–1
    pub fn min_success_rate(&self) -> f64 {
        self.minimum_secondary_user_sync_success_percent / 100.0
    }

    /// Thresholds shared by the sync check and the unhealthy-secondary check
    pub fn sync_thresholds(&self) -> SyncThresholds {
        SyncThresholds {
            min_success_rate: self.min_success_rate(),
            min_failed_sync_requests: self.minimum_failed_sync_requests_before_reconfig,
        }
    }
}

fn validate_endpoint(field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::invalid(
            field,
            format!("'{}' is not an absolute http(s) URL", value),
        ));
    }
    Ok(())
}
