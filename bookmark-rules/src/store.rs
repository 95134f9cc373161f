use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bookmark_protocol::bookmark::{BookmarkEvent, EventKind};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::action::Action;
use crate::condition::Condition;
use crate::error::RuleError;
use crate::rule::Rule;
use crate::validation::{validate_rule, ValidationError};

/// Read access the dispatcher needs from wherever rules are persisted.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Enabled rules of `user_id` whose trigger matches the given variant and
    /// identifier, in creation order.
    async fn list_enabled_rules_for_trigger(
        &self,
        user_id: &str,
        kind: EventKind,
        identifier: Option<&str>,
    ) -> Result<Vec<Rule>, RuleError>;
}

/// Versioned history entry for a stored rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleHistoryEntry {
    pub version: u32,
    pub rule: Rule,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl RuleHistoryEntry {
    fn new(version: u32, rule: Rule, updated_by: Option<String>) -> Self {
        Self {
            version,
            rule,
            created_at: Utc::now(),
            updated_by,
        }
    }
}

#[derive(Default)]
struct UserRules {
    /// Rule ids in creation order.
    order: Vec<String>,
    rules: HashMap<String, Vec<RuleHistoryEntry>>,
}

impl UserRules {
    fn latest(&self) -> impl Iterator<Item = &RuleHistoryEntry> {
        self.order
            .iter()
            .filter_map(|id| self.rules.get(id).and_then(|versions| versions.last()))
    }
}

/// In-memory multi-user rule store with version tracking.
#[derive(Default, Clone)]
pub struct InMemoryRuleStore {
    inner: Arc<RwLock<HashMap<String, UserRules>>>,
}

impl InMemoryRuleStore {
    /// Creates a new empty rule store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the list of users currently tracked.
    pub fn users(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner.keys().cloned().collect()
    }

    /// Returns the latest rule versions for the provided user, in creation order.
    pub fn list_rules(&self, user_id: &str) -> Vec<RuleHistoryEntry> {
        let inner = self.inner.read();
        inner
            .get(user_id)
            .map(|rules| rules.latest().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the full history for a specific rule.
    pub fn rule_history(&self, user_id: &str, rule_id: &str) -> Vec<RuleHistoryEntry> {
        let inner = self.inner.read();
        inner
            .get(user_id)
            .and_then(|rules| rules.rules.get(rule_id).cloned())
            .unwrap_or_default()
    }

    /// Returns the latest version of a rule, if available.
    pub fn latest_rule(&self, user_id: &str, rule_id: &str) -> Option<RuleHistoryEntry> {
        let inner = self.inner.read();
        inner
            .get(user_id)
            .and_then(|rules| rules.rules.get(rule_id))
            .and_then(|versions| versions.last().cloned())
    }

    /// Validates and stores a new rule. A blank id is replaced with a generated one.
    pub fn create_rule(
        &self,
        user_id: &str,
        mut rule: Rule,
        updated_by: Option<String>,
    ) -> Result<RuleHistoryEntry, RuleError> {
        if rule.id.trim().is_empty() {
            rule.id = format!("rule-{}", Uuid::new_v4());
        }
        ensure_valid(&rule.id, validate_rule(&rule))?;

        let mut inner = self.inner.write();
        let user_rules = inner.entry(user_id.to_string()).or_default();
        if user_rules.rules.contains_key(&rule.id) {
            return Err(RuleError::DuplicateRule { id: rule.id });
        }

        debug!(user_id, rule_id = %rule.id, "rule created");
        let entry = RuleHistoryEntry::new(1, rule, updated_by);
        user_rules.order.push(entry.rule.id.clone());
        user_rules
            .rules
            .insert(entry.rule.id.clone(), vec![entry.clone()]);
        Ok(entry)
    }

    /// Replaces the trigger, condition and actions of a rule, re-validating them.
    pub fn replace_definition(
        &self,
        user_id: &str,
        rule_id: &str,
        event: BookmarkEvent,
        condition: Condition,
        actions: Vec<Action>,
        updated_by: Option<String>,
    ) -> Result<RuleHistoryEntry, RuleError> {
        self.append_version(user_id, rule_id, updated_by, |rule| {
            rule.event = event;
            rule.condition = condition;
            rule.actions = actions;
            ensure_valid(&rule.id, validate_rule(rule))
        })
    }

    /// Updates name and description without touching the condition or action trees.
    pub fn update_metadata(
        &self,
        user_id: &str,
        rule_id: &str,
        name: impl Into<String>,
        description: Option<String>,
        updated_by: Option<String>,
    ) -> Result<RuleHistoryEntry, RuleError> {
        let name = name.into();
        self.append_version(user_id, rule_id, updated_by, |rule| {
            if name.trim().is_empty() {
                return ensure_valid(&rule.id, vec![ValidationError::EmptyName]);
            }
            rule.name = name;
            rule.description = description;
            Ok(())
        })
    }

    /// Enables or disables a rule. Returns the latest entry untouched when the
    /// flag already has the requested value.
    pub fn set_enabled(
        &self,
        user_id: &str,
        rule_id: &str,
        enabled: bool,
        updated_by: Option<String>,
    ) -> Result<RuleHistoryEntry, RuleError> {
        if let Some(latest) = self.latest_rule(user_id, rule_id) {
            if latest.rule.enabled == enabled {
                return Ok(latest);
            }
        }
        self.append_version(user_id, rule_id, updated_by, |rule| {
            rule.enabled = enabled;
            Ok(())
        })
    }

    /// Removes a rule and its history.
    pub fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<(), RuleError> {
        let mut inner = self.inner.write();
        let user_rules = inner
            .get_mut(user_id)
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))?;
        user_rules
            .rules
            .remove(rule_id)
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))?;
        user_rules.order.retain(|id| id != rule_id);
        Ok(())
    }

    fn append_version<F>(
        &self,
        user_id: &str,
        rule_id: &str,
        updated_by: Option<String>,
        change: F,
    ) -> Result<RuleHistoryEntry, RuleError>
    where
        F: FnOnce(&mut Rule) -> Result<(), RuleError>,
    {
        let mut inner = self.inner.write();
        let history = inner
            .get_mut(user_id)
            .and_then(|rules| rules.rules.get_mut(rule_id))
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))?;
        let latest = history
            .last()
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))?;

        let mut rule = latest.rule.clone();
        let version = latest.version + 1;
        change(&mut rule)?;

        let entry = RuleHistoryEntry::new(version, rule, updated_by);
        history.push(entry.clone());
        Ok(entry)
    }
}

fn ensure_valid(rule_id: &str, errors: Vec<ValidationError>) -> Result<(), RuleError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RuleError::Invalid {
            rule_id: rule_id.to_string(),
            errors,
        })
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn list_enabled_rules_for_trigger(
        &self,
        user_id: &str,
        kind: EventKind,
        identifier: Option<&str>,
    ) -> Result<Vec<Rule>, RuleError> {
        let inner = self.inner.read();
        let rules = inner
            .get(user_id)
            .map(|rules| {
                rules
                    .latest()
                    .filter(|entry| entry.rule.is_enabled())
                    .filter(|entry| entry.rule.event.matches_key(kind, identifier))
                    .map(|entry| entry.rule.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rule(id: &str, event: BookmarkEvent) -> Rule {
        Rule::new(id, format!("rule {}", id), event)
            .described("demo")
            .then(Action::add_tag("matched"))
    }

    #[test]
    fn versioning_is_tracked() {
        let store = InMemoryRuleStore::new();
        let entry1 = store
            .create_rule("alice", sample_rule("tagger", BookmarkEvent::BookmarkAdded), None)
            .expect("create");
        assert_eq!(entry1.version, 1);

        let entry2 = store
            .update_metadata("alice", "tagger", "renamed", None, Some("alice".into()))
            .expect("rename");
        assert_eq!(entry2.version, 2);
        assert_eq!(entry2.updated_by.as_deref(), Some("alice"));
        assert_eq!(entry2.rule.name, "renamed");
        assert_eq!(entry2.rule.actions, entry1.rule.actions);

        let history = store.rule_history("alice", "tagger");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[1].version, 2);
    }

    #[test]
    fn invalid_rules_are_rejected_with_all_errors() {
        let store = InMemoryRuleStore::new();
        let rule = Rule::new("bad", "", BookmarkEvent::tag_added(""));

        let err = store.create_rule("alice", rule, None).expect_err("invalid");
        assert_eq!(err.validation_errors().len(), 3);
        assert!(store.list_rules("alice").is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let store = InMemoryRuleStore::new();
        let rule = sample_rule("dup", BookmarkEvent::Archived);
        store.create_rule("alice", rule.clone(), None).expect("first");
        let err = store.create_rule("alice", rule, None).expect_err("duplicate");
        assert!(matches!(err, RuleError::DuplicateRule { ref id } if id == "dup"));
    }

    #[test]
    fn blank_id_is_generated() {
        let store = InMemoryRuleStore::new();
        let entry = store
            .create_rule("alice", sample_rule(" ", BookmarkEvent::Archived), None)
            .expect("create");
        assert!(entry.rule.id.starts_with("rule-"));
    }

    #[test]
    fn metadata_update_keeps_name_non_empty() {
        let store = InMemoryRuleStore::new();
        store
            .create_rule("alice", sample_rule("r", BookmarkEvent::Archived), None)
            .expect("create");
        let err = store
            .update_metadata("alice", "r", "  ", None, None)
            .expect_err("blank name");
        assert_eq!(err.validation_errors(), &[ValidationError::EmptyName]);
        assert_eq!(store.rule_history("alice", "r").len(), 1);
    }

    #[test]
    fn replacing_definition_revalidates() {
        let store = InMemoryRuleStore::new();
        store
            .create_rule("alice", sample_rule("r", BookmarkEvent::Archived), None)
            .expect("create");

        let err = store
            .replace_definition(
                "alice",
                "r",
                BookmarkEvent::Archived,
                Condition::and(Vec::<Condition>::new()),
                vec![],
                None,
            )
            .expect_err("invalid definition");
        assert_eq!(err.validation_errors().len(), 2);

        let entry = store
            .replace_definition(
                "alice",
                "r",
                BookmarkEvent::Favourited,
                Condition::IsArchived,
                vec![Action::DownloadFullPageArchive],
                None,
            )
            .expect("valid definition");
        assert_eq!(entry.version, 2);
        assert_eq!(entry.rule.event, BookmarkEvent::Favourited);
    }

    #[tokio::test]
    async fn lists_enabled_rules_matching_trigger_in_creation_order() {
        let store = InMemoryRuleStore::new();
        for (id, event) in [
            ("c", BookmarkEvent::tag_added("x")),
            ("a", BookmarkEvent::tag_added("x")),
            ("other-tag", BookmarkEvent::tag_added("y")),
            ("other-kind", BookmarkEvent::tag_removed("x")),
            ("b", BookmarkEvent::tag_added("x")),
        ] {
            store
                .create_rule("alice", sample_rule(id, event), None)
                .expect("create");
        }
        store.set_enabled("alice", "a", false, None).expect("disable");

        let rules = store
            .list_enabled_rules_for_trigger("alice", EventKind::TagAdded, Some("x"))
            .await
            .expect("list");
        let ids: Vec<_> = rules.iter().map(|rule| rule.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(store.users(), vec!["alice".to_string()]);

        let none = store
            .list_enabled_rules_for_trigger("bob", EventKind::TagAdded, Some("x"))
            .await
            .expect("list");
        assert!(none.is_empty());
    }

    #[test]
    fn disabling_twice_does_not_create_new_version() {
        let store = InMemoryRuleStore::new();
        let entry = store
            .create_rule("alice", sample_rule("deny", BookmarkEvent::Archived), None)
            .expect("create");
        assert!(entry.rule.enabled);

        let disabled = store
            .set_enabled("alice", "deny", false, Some("system".into()))
            .expect("disable rule");
        assert!(!disabled.rule.enabled);
        assert_eq!(disabled.version, entry.version + 1);

        let again = store
            .set_enabled("alice", "deny", false, None)
            .expect("disable again");
        assert_eq!(again.version, disabled.version);
    }

    #[test]
    fn delete_removes_rule() {
        let store = InMemoryRuleStore::new();
        store
            .create_rule("alice", sample_rule("r", BookmarkEvent::Archived), None)
            .expect("create");
        store.delete_rule("alice", "r").expect("delete");
        assert!(store.latest_rule("alice", "r").is_none());
        assert!(matches!(
            store.delete_rule("alice", "r"),
            Err(RuleError::NotFound(_))
        ));
    }
}
