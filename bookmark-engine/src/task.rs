use bookmark_rules::{JobKind, JobRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job accepted by the runtime, together with its delivery bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobTask {
    pub id: Uuid,
    pub kind: JobKind,
    pub bookmark_id: String,
    pub payload: serde_json::Value,
    /// Deliveries made so far, including the one in flight.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

impl JobTask {
    pub fn from_request(request: JobRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: request.kind,
            bookmark_id: request.bookmark_id,
            payload: request.payload,
            attempt: 0,
            created_at: Utc::now(),
        }
    }
}

/// Current status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    /// Failed at least once and queued again.
    Retrying,
    Completed,
    /// Failed on its last allowed attempt.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// In-memory record that tracks the lifecycle of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub task: JobTask,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl JobRecord {
    pub fn new(task: JobTask) -> Self {
        Self {
            task,
            status: JobStatus::Queued,
            started_at: None,
            finished_at: None,
            last_error: None,
            result: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.task.attempt
    }
}
