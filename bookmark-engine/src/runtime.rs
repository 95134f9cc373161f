use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use bookmark_rules::{JobDispatcher, JobError, JobHandle, JobRequest};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::scheduler::JobScheduler;
use crate::task::{JobRecord, JobStatus, JobTask};

/// Performs the work behind a job, such as crawling and archiving a page.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, task: &JobTask) -> Result<serde_json::Value, String>;
}

type Registry = Arc<RwLock<HashMap<Uuid, JobRecord>>>;

#[derive(Clone)]
struct Shared {
    scheduler: JobScheduler,
    registry: Registry,
    notify: Arc<Notify>,
    shutting_down: Arc<AtomicBool>,
    max_attempts: u32,
}

/// Handle used to submit and inspect jobs while the runtime is running.
#[derive(Clone)]
pub struct JobQueueHandle {
    shared: Shared,
}

impl JobQueueHandle {
    pub fn submit_request(&self, request: JobRequest) -> Result<JobHandle, EngineError> {
        if self.shared.shutting_down.load(Ordering::Relaxed) {
            return Err(EngineError::ShuttingDown);
        }
        if request.bookmark_id.trim().is_empty() {
            return Err(EngineError::Rejected("job has no bookmark id".to_string()));
        }

        let task = JobTask::from_request(request);
        let handle = JobHandle {
            id: task.id,
            kind: task.kind,
        };
        self.shared
            .registry
            .write()
            .insert(task.id, JobRecord::new(task.clone()));
        self.shared.scheduler.enqueue(task);
        self.shared.notify.notify_one();
        Ok(handle)
    }

    pub fn get(&self, job_id: &Uuid) -> Result<JobRecord, EngineError> {
        self.shared
            .registry
            .read()
            .get(job_id)
            .cloned()
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))
    }

    pub fn list_for_bookmark(&self, bookmark_id: &str) -> Vec<JobRecord> {
        self.shared
            .registry
            .read()
            .values()
            .filter(|record| record.task.bookmark_id == bookmark_id)
            .cloned()
            .collect()
    }

    /// Jobs waiting in the queue, including ones scheduled for a retry.
    pub fn pending_jobs(&self) -> usize {
        self.shared.scheduler.pending()
    }

    /// Drops completed and failed records from the registry and returns how
    /// many were removed. Queued, running and retrying jobs are kept.
    pub fn prune_finished(&self) -> usize {
        let mut registry = self.shared.registry.write();
        let before = registry.len();
        registry.retain(|_, record| !record.status.is_terminal());
        let pruned = before - registry.len();
        if pruned > 0 {
            debug!(pruned, remaining = registry.len(), "pruned finished jobs");
        }
        pruned
    }
}

#[async_trait]
impl JobDispatcher for JobQueueHandle {
    async fn submit(&self, request: JobRequest) -> Result<JobHandle, JobError> {
        self.submit_request(request).map_err(JobError::from)
    }
}

/// Worker pool that delivers each job at least once, retrying failed
/// deliveries up to the configured number of attempts.
pub struct JobRuntime {
    shared: Shared,
    workers: Vec<JoinHandle<()>>,
}

impl JobRuntime {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            shared: Shared {
                scheduler: JobScheduler::new(),
                registry: Arc::new(RwLock::new(HashMap::new())),
                notify: Arc::new(Notify::new()),
                shutting_down: Arc::new(AtomicBool::new(false)),
                max_attempts: max_attempts.max(1),
            },
            workers: Vec::new(),
        }
    }

    pub fn handle(&self) -> JobQueueHandle {
        JobQueueHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn start<H>(&mut self, handler: Arc<H>, worker_count: usize)
    where
        H: JobHandler,
    {
        for worker_index in 0..worker_count.max(1) {
            let shared = self.shared.clone();
            let handler = handler.clone();
            self.workers.push(tokio::spawn(async move {
                worker_loop(worker_index, shared, handler).await;
            }));
        }
    }

    /// Stops accepting jobs and waits for in-flight deliveries to finish.
    /// Jobs still queued stay in the registry as `Queued` or `Retrying`.
    pub async fn shutdown(self) {
        self.shared.shutting_down.store(true, Ordering::Relaxed);
        self.shared.notify.notify_waiters();
        for handle in self.workers {
            if let Err(err) = handle.await {
                error!("job worker crashed: {:?}", err);
            }
        }
    }
}

async fn next_task(shared: &Shared) -> Option<JobTask> {
    loop {
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if shared.shutting_down.load(Ordering::Relaxed) {
            return None;
        }
        if let Some(task) = shared.scheduler.next_task() {
            return Some(task);
        }
        notified.await;
    }
}

async fn worker_loop<H>(worker_index: usize, shared: Shared, handler: Arc<H>)
where
    H: JobHandler,
{
    while let Some(mut task) = next_task(&shared).await {
        task.attempt += 1;
        let started_at = chrono::Utc::now();
        if let Some(record) = shared.registry.write().get_mut(&task.id) {
            record.task.attempt = task.attempt;
            record.status = JobStatus::Running;
            record.started_at = Some(started_at);
        }

        info!(
            worker = worker_index,
            job_id = %task.id,
            kind = %task.kind,
            bookmark_id = %task.bookmark_id,
            attempt = task.attempt,
            "executing job"
        );

        let result = handler.handle(&task).await;
        let retry = result.is_err() && task.attempt < shared.max_attempts;

        {
            let mut registry = shared.registry.write();
            if let Some(record) = registry.get_mut(&task.id) {
                match &result {
                    Ok(value) => {
                        record.status = JobStatus::Completed;
                        record.result = Some(value.clone());
                        record.last_error = None;
                        record.finished_at = Some(chrono::Utc::now());
                    }
                    Err(err) => {
                        record.last_error = Some(err.clone());
                        if retry {
                            record.status = JobStatus::Retrying;
                        } else {
                            record.status = JobStatus::Failed;
                            record.finished_at = Some(chrono::Utc::now());
                        }
                    }
                }
            }
        }

        if let Err(err) = result {
            if retry {
                warn!(job_id = %task.id, attempt = task.attempt, error = %err, "job failed, retrying");
                shared.scheduler.enqueue(task);
                shared.notify.notify_one();
            } else {
                error!(job_id = %task.id, attempts = task.attempt, error = %err, "job failed");
            }
        }
    }
}
