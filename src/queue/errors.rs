//! Job runtime errors

use thiserror::Error;

/// Result type for queue operations and job processors
pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Job payload is missing fields or has the wrong shape
    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    /// Processor failed the job
    #[error("Job processing failed: {0}")]
    Processing(String),

    /// Job kind does not belong to the queue it was sent to
    #[error("Job '{job}' does not belong to queue '{queue}'")]
    WrongQueue { job: String, queue: String },

    /// No processor registered for the job kind
    #[error("No processor registered for job '{0}'")]
    NoProcessor(String),

    /// Queue is no longer accepting jobs
    #[error("Queue closed: {0}")]
    Closed(String),

    /// Journal I/O failed
    #[error("Journal error: {0}")]
    Journal(String),

    /// Journal record failed checksum or parse
    #[error("Corrupted journal record at line {line}: {reason}")]
    Corrupted { line: usize, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn invalid_payload(e: impl std::fmt::Display) -> Self {
        QueueError::InvalidPayload(e.to_string())
    }
}

impl From<std::io::Error> for QueueError {
    fn from(e: std::io::Error) -> Self {
        QueueError::Journal(e.to_string())
    }
}
