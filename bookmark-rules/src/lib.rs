//! Automation rules for bookmarks.
//!
//! Users describe rules as a trigger event, a boolean condition tree over a
//! bookmark snapshot and an ordered list of actions. The [`RuleDispatcher`]
//! matches fired events to enabled rules, evaluates their conditions against a
//! fresh snapshot and applies their actions through a [`BookmarkRepository`]
//! and a [`JobDispatcher`]. Actions that change a bookmark emit follow-up
//! events, which are dispatched in turn up to a bounded chain depth.
//!
//! Rules are plain serde documents and can be loaded from YAML/JSON files with
//! [`load_rules`] or managed through the versioned [`InMemoryRuleStore`].

mod action;
mod condition;
mod engine;
mod error;
mod executor;
mod jobs;
mod loader;
mod outcome;
mod repository;
mod rule;
mod store;
mod validation;

pub use action::Action;
pub use condition::Condition;
pub use engine::{DispatchSettings, DispatchStage, RuleDispatcher};
pub use error::{ChainDepthExceeded, ExecutionError, JobError, RepositoryError, RuleError};
pub use executor::{ActionBatch, ActionExecutor, SubmittedJobs};
pub use jobs::{InMemoryJobQueue, JobDispatcher, JobHandle, JobKind, JobRequest};
pub use loader::load_rules;
pub use outcome::{ActionReport, ActionStatus, DispatchReport, PassReport, RuleOutcome};
pub use repository::{BookmarkRepository, InMemoryBookmarkRepository};
pub use rule::Rule;
pub use store::{InMemoryRuleStore, RuleHistoryEntry, RuleStore};
pub use validation::{
    validate_actions, validate_condition, validate_event, validate_rule, ValidationError,
    MAX_CONDITION_DEPTH,
};
