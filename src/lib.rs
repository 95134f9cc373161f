//! Bookmark automation: user-defined rules that react to bookmark lifecycle
//! events.
//!
//! The workspace is split into:
//!
//! * `bookmark-protocol`: bookmark snapshots and lifecycle events
//! * `bookmark-core`: configuration, errors and logging setup
//! * `bookmark-rules`: rule model, validation, evaluation and dispatch
//! * `bookmark-engine`: background dispatch lanes and the job runtime
//!
//! This crate re-exports the commonly used pieces and wires them together in
//! [`Automation`].

pub mod bootstrap;

pub use bookmark_core::{AutomationConfig, Environment};
pub use bookmark_engine::{
    AutomationService, EngineError, JobHandler, JobQueueHandle, JobRecord, JobRuntime, JobStatus,
    JobTask,
};
pub use bookmark_protocol::bookmark::{
    BookmarkEvent, BookmarkKind, BookmarkSnapshot, BookmarkSnapshotBuilder, EventKind,
};
pub use bookmark_rules::{
    load_rules, Action, ActionStatus, BookmarkRepository, ChainDepthExceeded, Condition,
    DispatchReport, DispatchSettings, ExecutionError, InMemoryBookmarkRepository,
    InMemoryJobQueue, InMemoryRuleStore, JobDispatcher, JobRequest, RepositoryError, Rule,
    RuleDispatcher, RuleError, RuleStore, ValidationError,
};
pub use bootstrap::{init_from_env, Automation};
