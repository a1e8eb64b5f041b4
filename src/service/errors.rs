//! Service lifecycle errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::peers::PeerError;
use crate::queue::QueueError;

/// Result type for service boot and shutdown
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Collaborator could not be constructed
    #[error(transparent)]
    Peer(#[from] PeerError),
}
