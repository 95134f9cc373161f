use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored content kind of a bookmark.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkKind {
    Link,
    Text,
    Asset,
}

impl BookmarkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookmarkKind::Link => "link",
            BookmarkKind::Text => "text",
            BookmarkKind::Asset => "asset",
        }
    }
}

impl fmt::Display for BookmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully materialized view of a bookmark at a point in time.
///
/// Everything a condition may inspect is present on the snapshot, so the
/// evaluator never has to reach back into storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookmarkSnapshot {
    pub id: String,
    /// Owner of the bookmark. Rules are scoped per user.
    pub user_id: String,
    pub kind: BookmarkKind,
    /// Only populated for [`BookmarkKind::Link`] bookmarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub tag_ids: BTreeSet<String>,
    #[serde(default)]
    pub list_ids: BTreeSet<String>,
    /// RSS feeds whose import records created this bookmark.
    #[serde(default)]
    pub feed_ids: BTreeSet<String>,
    #[serde(default)]
    pub favourited: bool,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl BookmarkSnapshot {
    pub fn builder(
        id: impl Into<String>,
        user_id: impl Into<String>,
        kind: BookmarkKind,
    ) -> BookmarkSnapshotBuilder {
        BookmarkSnapshotBuilder::new(id, user_id, kind)
    }

    /// Shorthand for a link bookmark pointing at `url`.
    pub fn link(id: impl Into<String>, user_id: impl Into<String>, url: impl Into<String>) -> Self {
        BookmarkSnapshotBuilder::new(id, user_id, BookmarkKind::Link)
            .url(url)
            .build()
    }

    pub fn is_link(&self) -> bool {
        self.kind == BookmarkKind::Link
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tag_ids.contains(tag_id)
    }

    pub fn in_list(&self, list_id: &str) -> bool {
        self.list_ids.contains(list_id)
    }

    pub fn imported_from(&self, feed_id: &str) -> bool {
        self.feed_ids.contains(feed_id)
    }
}

/// Builder helper to create snapshots with many optional fields.
pub struct BookmarkSnapshotBuilder {
    snapshot: BookmarkSnapshot,
}

impl BookmarkSnapshotBuilder {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, kind: BookmarkKind) -> Self {
        let snapshot = BookmarkSnapshot {
            id: id.into(),
            user_id: user_id.into(),
            kind,
            url: None,
            tag_ids: BTreeSet::new(),
            list_ids: BTreeSet::new(),
            feed_ids: BTreeSet::new(),
            favourited: false,
            archived: false,
            created_at: Utc::now(),
        };

        Self { snapshot }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.snapshot.url = Some(url.into());
        self
    }

    pub fn tag(mut self, tag_id: impl Into<String>) -> Self {
        self.snapshot.tag_ids.insert(tag_id.into());
        self
    }

    pub fn list(mut self, list_id: impl Into<String>) -> Self {
        self.snapshot.list_ids.insert(list_id.into());
        self
    }

    pub fn feed(mut self, feed_id: impl Into<String>) -> Self {
        self.snapshot.feed_ids.insert(feed_id.into());
        self
    }

    pub fn favourited(mut self, favourited: bool) -> Self {
        self.snapshot.favourited = favourited;
        self
    }

    pub fn archived(mut self, archived: bool) -> Self {
        self.snapshot.archived = archived;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.snapshot.created_at = created_at;
        self
    }

    pub fn build(self) -> BookmarkSnapshot {
        self.snapshot
    }
}
