use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::task::JobTask;

#[derive(Default)]
struct Queues {
    by_bookmark: HashMap<String, VecDeque<JobTask>>,
    rotation: VecDeque<String>,
}

/// Scheduler that hands out jobs round-robin across bookmarks, first in first
/// out within a bookmark.
#[derive(Default, Clone)]
pub struct JobScheduler {
    inner: Arc<Mutex<Queues>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, task: JobTask) {
        let mut inner = self.inner.lock();
        let bookmark_id = task.bookmark_id.clone();
        inner
            .by_bookmark
            .entry(bookmark_id.clone())
            .or_default()
            .push_back(task);
        if !inner.rotation.iter().any(|queued| queued == &bookmark_id) {
            inner.rotation.push_back(bookmark_id);
        }
    }

    /// Returns the next job following a round-robin strategy.
    pub fn next_task(&self) -> Option<JobTask> {
        let mut inner = self.inner.lock();
        while let Some(bookmark_id) = inner.rotation.pop_front() {
            let Some(queue) = inner.by_bookmark.get_mut(&bookmark_id) else {
                continue;
            };
            let task = queue.pop_front();
            if queue.is_empty() {
                inner.by_bookmark.remove(&bookmark_id);
            } else {
                inner.rotation.push_back(bookmark_id);
            }
            if task.is_some() {
                return task;
            }
        }
        None
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().by_bookmark.values().map(VecDeque::len).sum()
    }

    pub fn pending_for_bookmark(&self, bookmark_id: &str) -> usize {
        self.inner
            .lock()
            .by_bookmark
            .get(bookmark_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}
