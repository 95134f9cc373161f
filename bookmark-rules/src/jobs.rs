use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::JobError;

/// Kinds of asynchronous work the rule engine can request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Crawl the bookmarked page again and store a full-page archive.
    FullPageArchive,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::FullPageArchive => f.write_str("full_page_archive"),
        }
    }
}

/// Submission handed to a [`JobDispatcher`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRequest {
    pub kind: JobKind,
    pub bookmark_id: String,
    pub payload: Value,
}

impl JobRequest {
    pub fn full_page_archive(bookmark_id: impl Into<String>) -> Self {
        let bookmark_id = bookmark_id.into();
        Self {
            kind: JobKind::FullPageArchive,
            payload: json!({
                "bookmark_id": bookmark_id,
                "archive_full_page_if_not_stored": true,
            }),
            bookmark_id,
        }
    }
}

/// Acknowledgement returned once a job has been accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobHandle {
    pub id: Uuid,
    pub kind: JobKind,
}

/// Fire-and-forget sink for asynchronous work with at-least-once delivery.
///
/// `submit` resolves once the job is durably accepted; the job's own outcome
/// is not reported back.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn submit(&self, request: JobRequest) -> Result<JobHandle, JobError>;
}

/// Process-local dispatcher that only records accepted submissions.
#[derive(Default, Clone)]
pub struct InMemoryJobQueue {
    accepted: Arc<Mutex<Vec<(JobHandle, JobRequest)>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<JobRequest> {
        self.accepted
            .lock()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// Removes and returns every accepted job.
    pub fn drain(&self) -> Vec<(JobHandle, JobRequest)> {
        std::mem::take(&mut *self.accepted.lock())
    }

    /// Makes every later submission fail with [`JobError::ShuttingDown`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobDispatcher for InMemoryJobQueue {
    async fn submit(&self, request: JobRequest) -> Result<JobHandle, JobError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(JobError::ShuttingDown);
        }
        let handle = JobHandle {
            id: Uuid::new_v4(),
            kind: request.kind,
        };
        self.accepted.lock().push((handle, request));
        Ok(handle)
    }
}
