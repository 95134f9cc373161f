use bookmark_protocol::bookmark::BookmarkEvent;
use serde::{Deserialize, Serialize};

/// Side effect performed on a bookmark when a rule matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AddTag { tag_id: String },
    RemoveTag { tag_id: String },
    AddToList { list_id: String },
    RemoveFromList { list_id: String },
    /// Enqueue a full-page archive job; does not touch the bookmark itself.
    DownloadFullPageArchive,
    FavouriteBookmark,
    ArchiveBookmark,
    /// An action type this build does not understand. Execution always fails.
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn add_tag(tag_id: impl Into<String>) -> Self {
        Action::AddTag {
            tag_id: tag_id.into(),
        }
    }

    pub fn remove_tag(tag_id: impl Into<String>) -> Self {
        Action::RemoveTag {
            tag_id: tag_id.into(),
        }
    }

    pub fn add_to_list(list_id: impl Into<String>) -> Self {
        Action::AddToList {
            list_id: list_id.into(),
        }
    }

    pub fn remove_from_list(list_id: impl Into<String>) -> Self {
        Action::RemoveFromList {
            list_id: list_id.into(),
        }
    }

    /// Variant name as it appears in serialized rules.
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddTag { .. } => "add_tag",
            Action::RemoveTag { .. } => "remove_tag",
            Action::AddToList { .. } => "add_to_list",
            Action::RemoveFromList { .. } => "remove_from_list",
            Action::DownloadFullPageArchive => "download_full_page_archive",
            Action::FavouriteBookmark => "favourite_bookmark",
            Action::ArchiveBookmark => "archive_bookmark",
            Action::Unknown => "unknown",
        }
    }

    /// Lifecycle event describing the state this action establishes, if any.
    pub fn follow_up_event(&self) -> Option<BookmarkEvent> {
        match self {
            Action::AddTag { tag_id } => Some(BookmarkEvent::tag_added(tag_id.clone())),
            Action::RemoveTag { tag_id } => Some(BookmarkEvent::tag_removed(tag_id.clone())),
            Action::AddToList { list_id } => Some(BookmarkEvent::added_to_list(list_id.clone())),
            Action::RemoveFromList { list_id } => {
                Some(BookmarkEvent::removed_from_list(list_id.clone()))
            }
            Action::FavouriteBookmark => Some(BookmarkEvent::Favourited),
            Action::ArchiveBookmark => Some(BookmarkEvent::Archived),
            Action::DownloadFullPageArchive | Action::Unknown => None,
        }
    }
}
