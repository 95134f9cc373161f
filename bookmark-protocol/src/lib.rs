//! Shared types exchanged between the bookmark mutation path and the rule
//! engine: the materialized bookmark snapshot and the lifecycle events emitted
//! whenever a mutation commits.

pub mod bookmark;

pub mod prelude {
    pub use crate::bookmark::{
        BookmarkEvent, BookmarkKind, BookmarkSnapshot, BookmarkSnapshotBuilder, EventKind,
    };
}
