//! Reconciliation errors

use thiserror::Error;

use crate::peers::PeerError;
use crate::queue::QueueError;

/// Result type for reconciliation steps
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// Sync request is missing its target, path or primary
    #[error("Invalid sync data found: {0}")]
    InvalidSyncData(String),

    /// Sync request names no wallet
    #[error("Invalid sync data wallets (expected non-empty array): {0}")]
    InvalidSyncWallets(String),

    /// Node selector returned nothing
    #[error("No healthy nodes available to select a new replica set from")]
    NoHealthyNodes,

    /// Random selection could not find enough eligible nodes
    #[error("Not enough healthy nodes found to issue new replica set after {attempts} attempts: needed {needed}, found {found}")]
    NotEnoughHealthyNodes {
        needed: usize,
        found: usize,
        attempts: usize,
    },

    /// An endpoint of the new replica set is not in the service-provider map
    #[error("New replica set endpoint has no service-provider id: {0}")]
    UnresolvedSpId(String),

    #[error(transparent)]
    Peer(#[from] PeerError),
}

impl From<ReconciliationError> for QueueError {
    fn from(e: ReconciliationError) -> Self {
        QueueError::Processing(e.to_string())
    }
}
