use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bookmark_protocol::bookmark::{BookmarkEvent, BookmarkSnapshot};
use tracing::{debug, warn};

use crate::action::Action;
use crate::error::{ExecutionError, RepositoryError};
use crate::jobs::{JobDispatcher, JobKind, JobRequest};
use crate::outcome::{ActionReport, ActionStatus};
use crate::repository::BookmarkRepository;

const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Statuses of a rule's actions plus the events they produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBatch {
    pub reports: Vec<ActionReport>,
    pub follow_ups: Vec<BookmarkEvent>,
}

/// Jobs already accepted during one dispatch chain.
///
/// A repeated submission for the same bookmark and job kind is reported as
/// [`ActionStatus::Skipped`] instead of reaching the job dispatcher again.
#[derive(Debug, Default, Clone)]
pub struct SubmittedJobs {
    seen: HashSet<(String, JobKind)>,
}

impl SubmittedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bookmark_id: &str, kind: JobKind) -> bool {
        self.seen.contains(&(bookmark_id.to_string(), kind))
    }

    fn record(&mut self, bookmark_id: &str, kind: JobKind) {
        self.seen.insert((bookmark_id.to_string(), kind));
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Applies actions to bookmarks through the repository and job dispatcher.
#[derive(Clone)]
pub struct ActionExecutor {
    repository: Arc<dyn BookmarkRepository>,
    jobs: Arc<dyn JobDispatcher>,
    submit_timeout: Duration,
    redispatch_skipped: bool,
}

impl ActionExecutor {
    pub fn new(repository: Arc<dyn BookmarkRepository>, jobs: Arc<dyn JobDispatcher>) -> Self {
        Self {
            repository,
            jobs,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            redispatch_skipped: true,
        }
    }

    pub fn with_submit_timeout(mut self, submit_timeout: Duration) -> Self {
        self.submit_timeout = submit_timeout;
        self
    }

    /// Whether skipped actions still yield their follow-up event.
    pub fn with_redispatch_skipped(mut self, redispatch_skipped: bool) -> Self {
        self.redispatch_skipped = redispatch_skipped;
        self
    }

    /// Executes a single action against a bookmark.
    ///
    /// State-changing actions check the current snapshot first and report
    /// [`ActionStatus::Skipped`] when their effect already holds.
    pub async fn execute(
        &self,
        action: &Action,
        bookmark_id: &str,
    ) -> Result<ActionStatus, ExecutionError> {
        if let Some(mutation) = Mutation::from_action(action) {
            return self.apply_mutation(mutation, bookmark_id).await;
        }

        match action {
            Action::DownloadFullPageArchive => self.submit_archive_job(bookmark_id).await,
            other => Err(ExecutionError::UnsupportedAction {
                action: other.name(),
            }),
        }
    }

    /// Executes every action in order. A failed action is recorded and the
    /// remaining ones still run.
    ///
    /// Jobs recorded in `submitted` are not submitted again; accepted jobs are
    /// added to it.
    pub async fn run_actions(
        &self,
        rule_id: &str,
        actions: &[Action],
        bookmark_id: &str,
        submitted: &mut SubmittedJobs,
    ) -> ActionBatch {
        let mut reports = Vec::with_capacity(actions.len());
        let mut follow_ups = Vec::new();

        for action in actions {
            let job = job_kind(action);
            let result = match job {
                Some(kind) if submitted.contains(bookmark_id, kind) => {
                    debug!(rule_id, bookmark_id, %kind, "job already submitted in this chain");
                    Ok(ActionStatus::Skipped)
                }
                _ => self.execute(action, bookmark_id).await,
            };
            if let (Some(kind), Ok(ActionStatus::Applied)) = (job, &result) {
                submitted.record(bookmark_id, kind);
            }
            match &result {
                Ok(status) => {
                    debug!(rule_id, bookmark_id, action = action.name(), ?status, "action executed");
                    let emits = match status {
                        ActionStatus::Applied => true,
                        ActionStatus::Skipped => self.redispatch_skipped,
                    };
                    if emits {
                        follow_ups.extend(action.follow_up_event());
                    }
                }
                Err(err) => {
                    warn!(rule_id, bookmark_id, action = action.name(), error = %err, "action failed");
                }
            }
            reports.push(ActionReport {
                action: action.clone(),
                result,
            });
        }

        ActionBatch {
            reports,
            follow_ups,
        }
    }

    async fn apply_mutation(
        &self,
        mutation: Mutation<'_>,
        bookmark_id: &str,
    ) -> Result<ActionStatus, ExecutionError> {
        let snapshot = self.repository.get_snapshot(bookmark_id).await?;
        if mutation.already_applied(&snapshot) {
            return Ok(ActionStatus::Skipped);
        }
        mutation.apply(self.repository.as_ref(), bookmark_id).await?;
        Ok(ActionStatus::Applied)
    }

    async fn submit_archive_job(&self, bookmark_id: &str) -> Result<ActionStatus, ExecutionError> {
        let request = JobRequest::full_page_archive(bookmark_id);
        match tokio::time::timeout(self.submit_timeout, self.jobs.submit(request)).await {
            Ok(Ok(handle)) => {
                debug!(bookmark_id, job_id = %handle.id, kind = %handle.kind, "job submitted");
                Ok(ActionStatus::Applied)
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(ExecutionError::JobSubmissionTimeout {
                timeout_ms: u64::try_from(self.submit_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

fn job_kind(action: &Action) -> Option<JobKind> {
    match action {
        Action::DownloadFullPageArchive => Some(JobKind::FullPageArchive),
        _ => None,
    }
}

/// Repository-backed actions.
enum Mutation<'a> {
    AddTag(&'a str),
    RemoveTag(&'a str),
    AddToList(&'a str),
    RemoveFromList(&'a str),
    Favourite,
    Archive,
}

impl<'a> Mutation<'a> {
    fn from_action(action: &'a Action) -> Option<Self> {
        match action {
            Action::AddTag { tag_id } => Some(Mutation::AddTag(tag_id)),
            Action::RemoveTag { tag_id } => Some(Mutation::RemoveTag(tag_id)),
            Action::AddToList { list_id } => Some(Mutation::AddToList(list_id)),
            Action::RemoveFromList { list_id } => Some(Mutation::RemoveFromList(list_id)),
            Action::FavouriteBookmark => Some(Mutation::Favourite),
            Action::ArchiveBookmark => Some(Mutation::Archive),
            Action::DownloadFullPageArchive | Action::Unknown => None,
        }
    }

    fn already_applied(&self, snapshot: &BookmarkSnapshot) -> bool {
        match self {
            Mutation::AddTag(tag_id) => snapshot.has_tag(tag_id),
            Mutation::RemoveTag(tag_id) => !snapshot.has_tag(tag_id),
            Mutation::AddToList(list_id) => snapshot.in_list(list_id),
            Mutation::RemoveFromList(list_id) => !snapshot.in_list(list_id),
            Mutation::Favourite => snapshot.favourited,
            Mutation::Archive => snapshot.archived,
        }
    }

    async fn apply(
        &self,
        repository: &dyn BookmarkRepository,
        bookmark_id: &str,
    ) -> Result<(), RepositoryError> {
        match self {
            Mutation::AddTag(tag_id) => repository.add_tag(bookmark_id, tag_id).await,
            Mutation::RemoveTag(tag_id) => repository.remove_tag(bookmark_id, tag_id).await,
            Mutation::AddToList(list_id) => repository.add_to_list(bookmark_id, list_id).await,
            Mutation::RemoveFromList(list_id) => {
                repository.remove_from_list(bookmark_id, list_id).await
            }
            Mutation::Favourite => repository.set_favourited(bookmark_id, true).await,
            Mutation::Archive => repository.set_archived(bookmark_id, true).await,
        }
    }
}
