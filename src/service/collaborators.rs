//! External collaborators the service is built with

use std::sync::Arc;

use super::errors::ServiceResult;
use crate::config::{ConfigError, StateMachineConfig};
use crate::peers::http::{build_client, HealthyNodeSelector, HttpPeerClient, HttpRegistry};
use crate::peers::{HealthProber, PrimaryHealthTracker, Registry, SyncTransport};
use crate::state_reconciliation::ReplicaSetUpdaters;

/// Everything outside the state machine that it talks to
pub struct Collaborators {
    pub registry: Arc<dyn Registry>,
    pub health: Arc<dyn HealthProber>,
    pub transport: Arc<dyn SyncTransport>,
    pub updaters: ReplicaSetUpdaters,
}

impl Collaborators {
    /// HTTP collaborators sharing one client. Requires `registryEndpoint`.
    pub fn from_config(config: &StateMachineConfig) -> ServiceResult<Self> {
        let registry_endpoint = config
            .registry_endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::invalid("registryEndpoint", "required to start the service"))?;

        let client = build_client(config.sync_request_timeout_ms)?;
        let peers = Arc::new(HttpPeerClient::new(client.clone()));
        let registry = Arc::new(HttpRegistry::new(client, registry_endpoint));

        let health = PrimaryHealthTracker::new(
            peers.clone(),
            config.max_number_seconds_primary_remains_unhealthy,
        );
        let selector = HealthyNodeSelector::new(registry.clone(), peers.clone());

        Ok(Self {
            registry: registry.clone(),
            health: Arc::new(health),
            transport: peers.clone(),
            updaters: ReplicaSetUpdaters {
                selector: Arc::new(selector),
                replicas: peers,
                writer: registry,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceError;

    #[test]
    fn test_requires_registry_endpoint() {
        let config = StateMachineConfig::for_endpoint("http://cn1.co");
        let err = Collaborators::from_config(&config).err().unwrap();
        assert!(matches!(err, ServiceError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_builds_http_collaborators() {
        let mut config = StateMachineConfig::for_endpoint("http://cn1.co");
        config.registry_endpoint = Some("http://registry.co".into());
        assert!(Collaborators::from_config(&config).is_ok());
    }
}
