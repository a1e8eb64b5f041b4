//! Peer collaborator errors

use thiserror::Error;

/// Result type for calls to external collaborators
pub type PeerResult<T> = Result<T, PeerError>;

/// Errors reported by registry, health, sync and replica-set collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    /// Peer could not be reached (connect failure, timeout)
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    /// Peer answered with a non-success status
    #[error("Peer rejected request: {0}")]
    Rejected(String),

    /// Peer answered with a body we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request could not be built from the given parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for PeerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            PeerError::Unreachable(e.to_string())
        } else if let Some(status) = e.status() {
            PeerError::Rejected(format!("status {}: {}", status, e))
        } else if e.is_decode() {
            PeerError::InvalidResponse(e.to_string())
        } else {
            PeerError::InvalidRequest(e.to_string())
        }
    }
}
