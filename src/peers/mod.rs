//! External collaborators
//!
//! The state machine only decides whether and against whom syncs and
//! reconfigurations happen. Everything that touches the network or the
//! on-chain registry sits behind the traits in this module:
//!
//! - [`Registry`]: current Content Node service providers
//! - [`HealthProber`]: liveness re-check for a user's primary
//! - [`NodeHealthCheck`]: raw single-node health probe
//! - [`SyncTransport`]: issues a sync request against a secondary
//! - [`ReplicaClient`]: a node's clock value for a wallet
//! - [`NodeSelector`]: currently healthy nodes to draw new replicas from
//! - [`ReplicaSetWriter`]: writes a user's new replica set
//!
//! HTTP adapters for all of them live in [`http`].

mod errors;
mod health;
pub mod http;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

pub use errors::{PeerError, PeerResult};
pub use health::PrimaryHealthTracker;

use crate::state_reconciliation::SyncRequestParameters;

/// Boxed future returned by collaborator calls
pub type PeerFuture<'a, T> = Pin<Box<dyn Future<Output = PeerResult<T>> + Send + 'a>>;

/// A registered Content Node service provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub endpoint: String,
    #[serde(rename = "spID", alias = "spId")]
    pub sp_id: u64,
}

impl NodeRecord {
    pub fn new(endpoint: impl Into<String>, sp_id: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            sp_id,
        }
    }
}

/// Service-provider registry
pub trait Registry: Send + Sync {
    /// List every registered Content Node with its service-provider id
    fn list_content_node_providers(&self) -> PeerFuture<'_, Vec<NodeRecord>>;
}

/// Liveness re-check used before declaring a user's primary unhealthy
pub trait HealthProber: Send + Sync {
    fn is_primary_healthy<'a>(&'a self, endpoint: &'a str) -> PeerFuture<'a, bool>;
}

/// Raw health probe against a single node
pub trait NodeHealthCheck: Send + Sync {
    fn is_node_healthy<'a>(&'a self, endpoint: &'a str) -> PeerFuture<'a, bool>;
}

/// Issues sync requests against secondaries
pub trait SyncTransport: Send + Sync {
    /// Issue exactly the described request; `Ok` means the peer accepted it
    fn send<'a>(&'a self, request: &'a SyncRequestParameters) -> PeerFuture<'a, ()>;
}

/// Reads per-user state from a replica
pub trait ReplicaClient: Send + Sync {
    /// Clock value of `wallet` on `endpoint`; `-1` when the node has no data
    fn clock_value<'a>(&'a self, endpoint: &'a str, wallet: &'a str) -> PeerFuture<'a, i64>;
}

/// Source of healthy candidate nodes for new replica sets
pub trait NodeSelector: Send + Sync {
    fn healthy_nodes(&self) -> PeerFuture<'_, Vec<String>>;
}

/// Writes replica-set assignments to the registry
pub trait ReplicaSetWriter: Send + Sync {
    fn update_replica_set<'a>(
        &'a self,
        user_id: u64,
        primary_sp_id: u64,
        secondary_sp_ids: &'a [u64],
    ) -> PeerFuture<'a, ()>;
}
