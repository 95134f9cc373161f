use bookmark_protocol::bookmark::BookmarkEvent;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::condition::Condition;
use crate::validation::{self, ValidationError};

/// User-authored binding of a trigger, a condition tree and an ordered action list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Unique identifier for the rule. Used for reporting and deduplication.
    pub id: String,
    /// Human readable name. Must not be empty.
    pub name: String,
    /// Optional human readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the rule is active.
    #[serde(default = "Rule::default_enabled")]
    pub enabled: bool,
    /// Trigger pattern matched against fired events by variant and identifier.
    pub event: BookmarkEvent,
    /// Matching condition for the rule.
    #[serde(default = "Condition::always")]
    pub condition: Condition,
    /// Actions executed, in order, when the condition matches.
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Rule {
    /// Starts an enabled rule with an `always_true` condition and no actions.
    pub fn new(id: impl Into<String>, name: impl Into<String>, event: BookmarkEvent) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            enabled: true,
            event,
            condition: Condition::always(),
            actions: Vec::new(),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn default_enabled() -> bool {
        true
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether this rule's trigger matches the fired event.
    pub fn triggered_by(&self, event: &BookmarkEvent) -> bool {
        self.event.matches(event)
    }

    /// Collects every structural problem with the rule. Empty means valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        validation::validate_rule(self)
    }
}
