use bookmark_protocol::bookmark::BookmarkEvent;

use crate::action::Action;
use crate::error::{ChainDepthExceeded, ExecutionError, RepositoryError};

/// Result of a single successfully executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// The action changed state or submitted a job.
    Applied,
    /// The bookmark was already in the state the action establishes.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    pub action: Action,
    pub result: Result<ActionStatus, ExecutionError>,
}

impl ActionReport {
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// How one candidate rule fared during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub matched: bool,
    /// Set when the fresh snapshot for this rule could not be loaded.
    pub snapshot_error: Option<RepositoryError>,
    /// Per-action statuses in declared order. Empty unless `matched`.
    pub actions: Vec<ActionReport>,
}

impl RuleOutcome {
    pub fn skipped(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            matched: false,
            snapshot_error: None,
            actions: Vec::new(),
        }
    }
}

/// Everything that happened while dispatching one event.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub event: BookmarkEvent,
    /// 0 for the originally received event.
    pub depth: usize,
    pub rules: Vec<RuleOutcome>,
    /// Set when the candidate rules or bookmark could not be loaded for this pass.
    pub load_error: Option<String>,
}

impl PassReport {
    pub fn new(event: BookmarkEvent, depth: usize) -> Self {
        Self {
            event,
            depth,
            rules: Vec::new(),
            load_error: None,
        }
    }
}

/// Aggregated view of a dispatch: every pass of the causal chain plus any truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub bookmark_id: String,
    pub passes: Vec<PassReport>,
    pub chain_errors: Vec<ChainDepthExceeded>,
}

impl DispatchReport {
    pub fn new(bookmark_id: impl Into<String>) -> Self {
        Self {
            bookmark_id: bookmark_id.into(),
            passes: Vec::new(),
            chain_errors: Vec::new(),
        }
    }

    /// Ids of rules whose condition matched, in execution order. A rule
    /// firing in several passes appears once per pass.
    pub fn fired_rules(&self) -> Vec<&str> {
        self.passes
            .iter()
            .flat_map(|pass| pass.rules.iter())
            .filter(|outcome| outcome.matched)
            .map(|outcome| outcome.rule_id.as_str())
            .collect()
    }

    /// Failed actions as `(rule id, action, error)`.
    pub fn failures(&self) -> Vec<(&str, &Action, &ExecutionError)> {
        self.passes
            .iter()
            .flat_map(|pass| pass.rules.iter())
            .flat_map(|outcome| {
                outcome.actions.iter().filter_map(move |report| {
                    report
                        .result
                        .as_ref()
                        .err()
                        .map(|err| (outcome.rule_id.as_str(), &report.action, err))
                })
            })
            .collect()
    }

    pub fn chain_truncated(&self) -> bool {
        !self.chain_errors.is_empty()
    }

    /// Deepest chain depth that was actually dispatched.
    pub fn max_depth_reached(&self) -> usize {
        self.passes.iter().map(|pass| pass.depth).max().unwrap_or(0)
    }
}
