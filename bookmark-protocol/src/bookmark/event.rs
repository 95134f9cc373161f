use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle transition of a bookmark.
///
/// The same shape doubles as a rule trigger pattern: a trigger matches an
/// event when both share a variant and, for variants carrying an identifier,
/// the identifiers are equal. The affected bookmark travels alongside the
/// event rather than inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookmarkEvent {
    BookmarkAdded,
    TagAdded { tag_id: String },
    TagRemoved { tag_id: String },
    AddedToList { list_id: String },
    RemovedFromList { list_id: String },
    Favourited,
    Archived,
}

/// Variant discriminant of a [`BookmarkEvent`], used to look up candidate rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BookmarkAdded,
    TagAdded,
    TagRemoved,
    AddedToList,
    RemovedFromList,
    Favourited,
    Archived,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BookmarkAdded => "bookmark_added",
            EventKind::TagAdded => "tag_added",
            EventKind::TagRemoved => "tag_removed",
            EventKind::AddedToList => "added_to_list",
            EventKind::RemovedFromList => "removed_from_list",
            EventKind::Favourited => "favourited",
            EventKind::Archived => "archived",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BookmarkEvent {
    pub fn tag_added(tag_id: impl Into<String>) -> Self {
        BookmarkEvent::TagAdded {
            tag_id: tag_id.into(),
        }
    }

    pub fn tag_removed(tag_id: impl Into<String>) -> Self {
        BookmarkEvent::TagRemoved {
            tag_id: tag_id.into(),
        }
    }

    pub fn added_to_list(list_id: impl Into<String>) -> Self {
        BookmarkEvent::AddedToList {
            list_id: list_id.into(),
        }
    }

    pub fn removed_from_list(list_id: impl Into<String>) -> Self {
        BookmarkEvent::RemovedFromList {
            list_id: list_id.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            BookmarkEvent::BookmarkAdded => EventKind::BookmarkAdded,
            BookmarkEvent::TagAdded { .. } => EventKind::TagAdded,
            BookmarkEvent::TagRemoved { .. } => EventKind::TagRemoved,
            BookmarkEvent::AddedToList { .. } => EventKind::AddedToList,
            BookmarkEvent::RemovedFromList { .. } => EventKind::RemovedFromList,
            BookmarkEvent::Favourited => EventKind::Favourited,
            BookmarkEvent::Archived => EventKind::Archived,
        }
    }

    /// Tag or list identifier carried by the event, if the variant has one.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            BookmarkEvent::TagAdded { tag_id } | BookmarkEvent::TagRemoved { tag_id } => {
                Some(tag_id)
            }
            BookmarkEvent::AddedToList { list_id } | BookmarkEvent::RemovedFromList { list_id } => {
                Some(list_id)
            }
            BookmarkEvent::BookmarkAdded | BookmarkEvent::Favourited | BookmarkEvent::Archived => {
                None
            }
        }
    }

    /// Whether this trigger pattern matches the fired `event`.
    pub fn matches(&self, event: &BookmarkEvent) -> bool {
        self.matches_key(event.kind(), event.identifier())
    }

    /// Same as [`BookmarkEvent::matches`] but against a raw (kind, identifier) pair.
    pub fn matches_key(&self, kind: EventKind, identifier: Option<&str>) -> bool {
        self.kind() == kind && self.identifier() == identifier
    }
}

impl fmt::Display for BookmarkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identifier() {
            Some(identifier) => write!(f, "{}({})", self.kind(), identifier),
            None => write!(f, "{}", self.kind()),
        }
    }
}
