mod event;
mod snapshot;

pub use event::{BookmarkEvent, EventKind};
pub use snapshot::{BookmarkKind, BookmarkSnapshot, BookmarkSnapshotBuilder};
