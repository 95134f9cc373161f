use std::fmt;
use std::path::PathBuf;

use bookmark_protocol::bookmark::BookmarkEvent;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors returned by the rules engine when loading, storing or dispatching rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rules path does not exist: {0}")]
    MissingPath(String),
    #[error("failed to read rules from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules from {path}: {message}")]
    Parse { path: String, message: String },
    #[error("duplicate rule identifier detected: {id}")]
    DuplicateRule { id: String },
    #[error("rule {rule_id} is invalid: {}", join_errors(.errors))]
    Invalid {
        rule_id: String,
        errors: Vec<ValidationError>,
    },
    #[error("rule not found: {0}")]
    NotFound(String),
    #[error("rule store unavailable: {0}")]
    Store(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RuleError {
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RuleError::Io {
            path: path.into().display().to_string(),
            source,
        }
    }

    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        RuleError::Parse {
            path: path.into().display().to_string(),
            message: message.into(),
        }
    }

    /// Validation errors carried by [`RuleError::Invalid`], empty otherwise.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            RuleError::Invalid { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure reported by a bookmark repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("bookmark not found: {0}")]
    BookmarkNotFound(String),
    #[error("bookmark repository unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by a job dispatcher when accepting a submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job rejected: {0}")]
    Rejected(String),
    #[error("job dispatcher is shutting down")]
    ShuttingDown,
}

/// Failure of a single action. Never aborts sibling actions or rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("job submission failed: {0}")]
    JobSubmission(#[from] JobError),
    #[error("job submission timed out after {timeout_ms}ms")]
    JobSubmissionTimeout { timeout_ms: u64 },
    #[error("unsupported action type `{action}`")]
    UnsupportedAction { action: &'static str },
}

/// Raised when a chain of follow-up events would exceed the configured depth.
///
/// The refused event is the last entry of `chain`; the first entry is the
/// originally received event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDepthExceeded {
    pub bookmark_id: String,
    pub max_depth: usize,
    pub chain: Vec<BookmarkEvent>,
}

impl ChainDepthExceeded {
    pub fn refused_event(&self) -> Option<&BookmarkEvent> {
        self.chain.last()
    }
}

impl fmt::Display for ChainDepthExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule chain too deep for bookmark {} (max depth {}): ",
            self.bookmark_id, self.max_depth
        )?;
        for (index, event) in self.chain.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", event)?;
        }
        Ok(())
    }
}

impl std::error::Error for ChainDepthExceeded {}
