//! CLI command implementations

use std::path::Path;
use std::time::Duration;

use serde_json::json;

use crate::config::StateMachineConfig;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::queue::EnqueueIntent;
use crate::reconfig::{ReconfigMode, ReconfigModeState};
use crate::service::{Collaborators, StateMachineManager};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_requests, write_error, write_response, JobRequest};

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Start {
            config,
            drain_timeout_secs,
        } => start(&config, Duration::from_secs(drain_timeout_secs)),
        Command::CheckConfig { config } => check_config(&config),
    }
}

fn load_config(config_path: &Path) -> CliResult<StateMachineConfig> {
    let config = StateMachineConfig::load(config_path)?;
    let path = config_path.display().to_string();
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("path", path.as_str()),
            ("endpoint", config.this_content_node_endpoint.as_str()),
        ],
    );
    Ok(config)
}

/// Boot the state machine and feed it job requests from stdin.
///
/// Each request line gets one response line with the new job id, or an
/// error. On EOF queued work is given `drain_timeout` to finish before the
/// service shuts down and prints its counters.
pub fn start(config_path: &Path, drain_timeout: Duration) -> CliResult<()> {
    let config = load_config(config_path)?;
    let collaborators = Collaborators::from_config(&config)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to start runtime: {}", e)))?;
    let manager = runtime.block_on(StateMachineManager::init(config, collaborators))?;

    for request in read_requests() {
        let enqueued = request.and_then(|JobRequest { job_name, data }| {
            manager
                .interfacer()
                .route(EnqueueIntent {
                    job_name,
                    payload: data,
                })
                .map_err(|e| CliError::request_rejected(e.to_string()))
        });
        match enqueued {
            Ok(id) => write_response(json!({ "jobId": id }))?,
            Err(e) => write_error(e.code_str(), e.message())?,
        }
    }

    let drained = runtime.block_on(manager.wait_until_idle(drain_timeout));
    if !drained {
        let secs = drain_timeout.as_secs().to_string();
        Logger::warn("DRAIN_TIMED_OUT", &[("timeout_secs", secs.as_str())]);
    }
    manager.shutdown();

    write_response(json!({
        "drained": drained,
        "metrics": manager.metrics().snapshot(),
    }))
}

/// Validate the configuration and print it with its derived reconfig modes
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let modes = ReconfigModeState::for_highest(
        config
            .highest_reconfig_mode()
            .unwrap_or(ReconfigMode::ReconfigDisabled),
    );
    write_response(json!({
        "config": config,
        "reconfigModes": modes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_check_config_accepts_valid_file() {
        let file = config_file(
            r#"{"thisContentNodeEndpoint":"http://cn1.co","highestReconfigMode":"ONE_SECONDARY"}"#,
        );
        check_config(file.path()).unwrap();
    }

    #[test]
    fn test_check_config_rejects_bad_percent() {
        let file = config_file(
            r#"{"thisContentNodeEndpoint":"http://cn1.co","minimumSecondaryUserSyncSuccessPercent":140}"#,
        );
        let err = check_config(file.path()).unwrap_err();
        assert_eq!(err.code_str(), "CNODE_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_start_requires_registry_endpoint() {
        let file = config_file(r#"{"thisContentNodeEndpoint":"http://cn1.co"}"#);
        let err = start(file.path(), Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.code_str(), "CNODE_CLI_CONFIG_ERROR");
    }
}
