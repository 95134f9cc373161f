use bookmark_rules::{JobError, RuleError};
use thiserror::Error;

/// Errors that may occur when interacting with the job runtime or the
/// background dispatch lanes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("runtime is shutting down")]
    ShuttingDown,
    #[error("job rejected: {0}")]
    Rejected(String),
    #[error("dispatch lane stopped before replying")]
    LaneStopped,
    #[error(transparent)]
    Dispatch(#[from] RuleError),
}

impl From<EngineError> for JobError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ShuttingDown | EngineError::LaneStopped => JobError::ShuttingDown,
            other => JobError::Rejected(other.to_string()),
        }
    }
}
