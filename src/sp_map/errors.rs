//! Service-provider map errors

use thiserror::Error;

/// Result type for map refreshes
pub type SpMapResult<T> = Result<T, SpMapError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpMapError {
    /// Registry gave nothing usable and there is no previous map to keep
    #[error("Failed to initialize service-provider map: {0}")]
    Initialization(String),
}
