//! Monitoring errors

use thiserror::Error;

use crate::peers::PeerError;
use crate::queue::QueueError;

/// Result type for per-user monitoring evaluation
pub type MonitoringResult<T> = Result<T, MonitoringError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitoringError {
    /// User record cannot be evaluated
    #[error("Invalid user record for wallet '{wallet}': {reason}")]
    InvalidUser { wallet: String, reason: String },

    #[error(transparent)]
    Peer(#[from] PeerError),
}

impl From<MonitoringError> for QueueError {
    fn from(e: MonitoringError) -> Self {
        QueueError::Processing(e.to_string())
    }
}
