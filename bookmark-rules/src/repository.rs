use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bookmark_protocol::bookmark::BookmarkSnapshot;
use parking_lot::RwLock;

use crate::error::RepositoryError;

/// Storage the engine reads bookmark state from and applies mutations to.
///
/// Every mutation must be safe to repeat.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    async fn get_snapshot(&self, bookmark_id: &str) -> Result<BookmarkSnapshot, RepositoryError>;
    async fn add_tag(&self, bookmark_id: &str, tag_id: &str) -> Result<(), RepositoryError>;
    async fn remove_tag(&self, bookmark_id: &str, tag_id: &str) -> Result<(), RepositoryError>;
    async fn add_to_list(&self, bookmark_id: &str, list_id: &str) -> Result<(), RepositoryError>;
    async fn remove_from_list(
        &self,
        bookmark_id: &str,
        list_id: &str,
    ) -> Result<(), RepositoryError>;
    async fn set_favourited(
        &self,
        bookmark_id: &str,
        favourited: bool,
    ) -> Result<(), RepositoryError>;
    async fn set_archived(&self, bookmark_id: &str, archived: bool) -> Result<(), RepositoryError>;
}

/// Process-local repository keyed by bookmark id.
#[derive(Default, Clone)]
pub struct InMemoryBookmarkRepository {
    inner: Arc<RwLock<HashMap<String, BookmarkSnapshot>>>,
}

impl InMemoryBookmarkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a bookmark.
    pub fn insert(&self, snapshot: BookmarkSnapshot) {
        self.inner.write().insert(snapshot.id.clone(), snapshot);
    }

    pub fn remove(&self, bookmark_id: &str) -> Option<BookmarkSnapshot> {
        self.inner.write().remove(bookmark_id)
    }

    /// Current state of a bookmark without going through the async trait.
    pub fn snapshot(&self, bookmark_id: &str) -> Option<BookmarkSnapshot> {
        self.inner.read().get(bookmark_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    fn update<F>(&self, bookmark_id: &str, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut BookmarkSnapshot),
    {
        let mut inner = self.inner.write();
        let snapshot = inner
            .get_mut(bookmark_id)
            .ok_or_else(|| RepositoryError::BookmarkNotFound(bookmark_id.to_string()))?;
        apply(snapshot);
        Ok(())
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryBookmarkRepository {
    async fn get_snapshot(&self, bookmark_id: &str) -> Result<BookmarkSnapshot, RepositoryError> {
        self.snapshot(bookmark_id)
            .ok_or_else(|| RepositoryError::BookmarkNotFound(bookmark_id.to_string()))
    }

    async fn add_tag(&self, bookmark_id: &str, tag_id: &str) -> Result<(), RepositoryError> {
        self.update(bookmark_id, |snapshot| {
            snapshot.tag_ids.insert(tag_id.to_string());
        })
    }

    async fn remove_tag(&self, bookmark_id: &str, tag_id: &str) -> Result<(), RepositoryError> {
        self.update(bookmark_id, |snapshot| {
            snapshot.tag_ids.remove(tag_id);
        })
    }

    async fn add_to_list(&self, bookmark_id: &str, list_id: &str) -> Result<(), RepositoryError> {
        self.update(bookmark_id, |snapshot| {
            snapshot.list_ids.insert(list_id.to_string());
        })
    }

    async fn remove_from_list(
        &self,
        bookmark_id: &str,
        list_id: &str,
    ) -> Result<(), RepositoryError> {
        self.update(bookmark_id, |snapshot| {
            snapshot.list_ids.remove(list_id);
        })
    }

    async fn set_favourited(
        &self,
        bookmark_id: &str,
        favourited: bool,
    ) -> Result<(), RepositoryError> {
        self.update(bookmark_id, |snapshot| snapshot.favourited = favourited)
    }

    async fn set_archived(&self, bookmark_id: &str, archived: bool) -> Result<(), RepositoryError> {
        self.update(bookmark_id, |snapshot| snapshot.archived = archived)
    }
}
