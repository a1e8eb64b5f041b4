//! HTTP adapters for the peer collaborators
//!
//! Routes:
//! - `GET  {node}/health_check`
//! - `GET  {node}/users/clock_status/{wallet}` → `{"data":{"clockValue":n}}`
//! - `{method} {baseURL}{url}` with the sync request body
//! - `GET  {registry}/content_nodes` → `[{"endpoint":..,"spID":..}]`
//! - `POST {registry}/users/{userId}/replica_set`

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};

use super::{
    NodeHealthCheck, NodeRecord, NodeSelector, PeerError, PeerFuture, PeerResult, Registry,
    ReplicaClient, ReplicaSetWriter, SyncTransport,
};
use crate::state_reconciliation::SyncRequestParameters;

/// Build the shared HTTP client with a per-request timeout
pub fn build_client(timeout_ms: u64) -> PeerResult<Client> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| PeerError::InvalidRequest(format!("failed to build http client: {}", e)))
}

/// Join a base URL and a path without doubling slashes
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Talks to peer Content Nodes
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct ClockStatusResponse {
    data: ClockStatusData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClockStatusData {
    clock_value: i64,
}

impl NodeHealthCheck for HttpPeerClient {
    fn is_node_healthy<'a>(&'a self, endpoint: &'a str) -> PeerFuture<'a, bool> {
        Box::pin(async move {
            let url = join_url(endpoint, "health_check");
            // Any transport failure or non-2xx status means unhealthy
            match self.client.get(url).send().await {
                Ok(response) => Ok(response.status().is_success()),
                Err(_) => Ok(false),
            }
        })
    }
}

impl ReplicaClient for HttpPeerClient {
    fn clock_value<'a>(&'a self, endpoint: &'a str, wallet: &'a str) -> PeerFuture<'a, i64> {
        Box::pin(async move {
            let url = join_url(endpoint, &format!("users/clock_status/{}", wallet));
            let response = self.client.get(url).send().await?.error_for_status()?;
            let body: ClockStatusResponse = response.json().await?;
            Ok(body.data.clock_value)
        })
    }
}

impl SyncTransport for HttpPeerClient {
    fn send<'a>(&'a self, request: &'a SyncRequestParameters) -> PeerFuture<'a, ()> {
        Box::pin(async move {
            let base_url = request
                .base_url
                .as_deref()
                .ok_or_else(|| PeerError::InvalidRequest("missing baseURL".into()))?;
            let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
                .map_err(|e| PeerError::InvalidRequest(format!("bad method: {}", e)))?;

            self.client
                .request(method, join_url(base_url, &request.url))
                .json(&request.data)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
    }
}

/// Registry reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplicaSetUpdateBody<'a> {
    primary: u64,
    secondaries: &'a [u64],
}

impl Registry for HttpRegistry {
    fn list_content_node_providers(&self) -> PeerFuture<'_, Vec<NodeRecord>> {
        Box::pin(async move {
            let url = join_url(&self.base_url, "content_nodes");
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok(response.json::<Vec<NodeRecord>>().await?)
        })
    }
}

impl ReplicaSetWriter for HttpRegistry {
    fn update_replica_set<'a>(
        &'a self,
        user_id: u64,
        primary_sp_id: u64,
        secondary_sp_ids: &'a [u64],
    ) -> PeerFuture<'a, ()> {
        Box::pin(async move {
            let url = join_url(&self.base_url, &format!("users/{}/replica_set", user_id));
            let body = ReplicaSetUpdateBody {
                primary: primary_sp_id,
                secondaries: secondary_sp_ids,
            };
            self.client
                .post(url)
                .json(&body)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
    }
}

/// Healthy nodes = registered nodes that pass a health check
pub struct HealthyNodeSelector {
    registry: Arc<dyn Registry>,
    check: Arc<dyn NodeHealthCheck>,
}

impl HealthyNodeSelector {
    pub fn new(registry: Arc<dyn Registry>, check: Arc<dyn NodeHealthCheck>) -> Self {
        Self { registry, check }
    }
}

impl NodeSelector for HealthyNodeSelector {
    fn healthy_nodes(&self) -> PeerFuture<'_, Vec<String>> {
        Box::pin(async move {
            let providers = self.registry.list_content_node_providers().await?;
            let checks = providers.iter().map(|node| async move {
                let healthy = self
                    .check
                    .is_node_healthy(&node.endpoint)
                    .await
                    .unwrap_or(false);
                (node.endpoint.clone(), healthy)
            });
            let results = futures_util::future::join_all(checks).await;
            Ok(results
                .into_iter()
                .filter(|(_, healthy)| *healthy)
                .map(|(endpoint, _)| endpoint)
                .collect())
        })
    }
}
