use bookmark_protocol::bookmark::BookmarkEvent;
use serde::Serialize;
use thiserror::Error;

use crate::action::Action;
use crate::condition::Condition;
use crate::rule::Rule;

/// Maximum nesting depth of a condition tree. The root sits at depth 0.
pub const MAX_CONDITION_DEPTH: usize = 10;

/// Structural problem found while validating a rule draft.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("{path}: {field} must not be empty")]
    MissingIdentifier { path: String, field: &'static str },
    #[error("{path}: `{combinator}` requires at least one child condition")]
    EmptyCombinator {
        path: String,
        combinator: &'static str,
    },
    #[error("{path}: condition is too complex (maximum nesting depth is {max_depth})")]
    TooComplex { path: String, max_depth: usize },
    #[error("rule must declare at least one action")]
    NoActions,
    #[error("{path}: unsupported {kind} type")]
    Unsupported { path: String, kind: &'static str },
}

/// Validates every part of the rule, accumulating all problems.
///
/// Metadata beyond the name (description, enabled flag) is never validated.
pub fn validate_rule(rule: &Rule) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if is_blank(&rule.name) {
        errors.push(ValidationError::EmptyName);
    }
    errors.extend(validate_event(&rule.event));
    errors.extend(validate_condition(&rule.condition));
    errors.extend(validate_actions(&rule.actions));
    errors
}

/// Checks that identifier-carrying triggers name a concrete tag or list.
pub fn validate_event(event: &BookmarkEvent) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    match event {
        BookmarkEvent::TagAdded { tag_id } | BookmarkEvent::TagRemoved { tag_id } => {
            require(&mut errors, "event", "tag_id", tag_id);
        }
        BookmarkEvent::AddedToList { list_id } | BookmarkEvent::RemovedFromList { list_id } => {
            require(&mut errors, "event", "list_id", list_id);
        }
        BookmarkEvent::BookmarkAdded | BookmarkEvent::Favourited | BookmarkEvent::Archived => {}
    }
    errors
}

pub fn validate_condition(condition: &Condition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    visit_condition(condition, "condition".to_string(), 0, &mut errors);
    errors
}

fn visit_condition(
    condition: &Condition,
    path: String,
    depth: usize,
    errors: &mut Vec<ValidationError>,
) {
    match condition {
        Condition::AlwaysTrue | Condition::IsFavourited | Condition::IsArchived => {}
        Condition::BookmarkTypeIs { .. } => {}
        Condition::UrlContains { substring } => require(errors, &path, "substring", substring),
        Condition::ImportedFromFeed { feed_id } => require(errors, &path, "feed_id", feed_id),
        Condition::HasTag { tag_id } => require(errors, &path, "tag_id", tag_id),
        Condition::And { children } | Condition::Or { children } => {
            if children.is_empty() {
                errors.push(ValidationError::EmptyCombinator {
                    path,
                    combinator: condition.name(),
                });
                return;
            }
            // Children would sit below the limit: one error for the whole branch.
            if depth >= MAX_CONDITION_DEPTH {
                errors.push(ValidationError::TooComplex {
                    path,
                    max_depth: MAX_CONDITION_DEPTH,
                });
                return;
            }
            for (index, child) in children.iter().enumerate() {
                visit_condition(
                    child,
                    format!("{}.children[{}]", path, index),
                    depth + 1,
                    errors,
                );
            }
        }
        Condition::Unknown => errors.push(ValidationError::Unsupported {
            path,
            kind: "condition",
        }),
    }
}

pub fn validate_actions(actions: &[Action]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if actions.is_empty() {
        errors.push(ValidationError::NoActions);
        return errors;
    }

    for (index, action) in actions.iter().enumerate() {
        let path = format!("actions[{}]", index);
        match action {
            Action::AddTag { tag_id } | Action::RemoveTag { tag_id } => {
                require(&mut errors, &path, "tag_id", tag_id);
            }
            Action::AddToList { list_id } | Action::RemoveFromList { list_id } => {
                require(&mut errors, &path, "list_id", list_id);
            }
            Action::DownloadFullPageArchive
            | Action::FavouriteBookmark
            | Action::ArchiveBookmark => {}
            Action::Unknown => errors.push(ValidationError::Unsupported {
                path,
                kind: "action",
            }),
        }
    }
    errors
}

fn require(errors: &mut Vec<ValidationError>, path: &str, field: &'static str, value: &str) {
    if is_blank(value) {
        errors.push(ValidationError::MissingIdentifier {
            path: path.to_string(),
            field,
        });
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn valid_rule() -> Rule {
        Rule::new("r1", "tag papers", BookmarkEvent::BookmarkAdded)
            .when(Condition::url_contains("arxiv.org"))
            .then(Action::add_tag("paper"))
    }

    fn nested(depth: usize, leaf: Condition) -> Condition {
        (0..depth).fold(leaf, |inner, _| Condition::and([inner]))
    }

    #[test]
    fn valid_rule_has_no_errors() {
        assert!(valid_rule().validate().is_empty());
    }

    #[test]
    fn validation_is_deterministic() {
        let mut rule = valid_rule();
        rule.name = " ".into();
        rule.event = BookmarkEvent::tag_added("");
        rule.actions.push(Action::add_to_list(""));
        assert_eq!(rule.validate(), rule.validate());
        assert_eq!(rule.validate().len(), 3);
    }

    #[test_case(BookmarkEvent::tag_added(""), "tag_id" ; "tag added")]
    #[test_case(BookmarkEvent::tag_removed(""), "tag_id" ; "tag removed")]
    #[test_case(BookmarkEvent::added_to_list(""), "list_id" ; "added to list")]
    #[test_case(BookmarkEvent::removed_from_list(""), "list_id" ; "removed from list")]
    fn event_identifiers_are_required(event: BookmarkEvent, field: &'static str) {
        assert_eq!(
            validate_event(&event),
            vec![ValidationError::MissingIdentifier {
                path: "event".into(),
                field
            }]
        );
    }

    #[test]
    fn collects_every_violation() {
        let rule = Rule::new("r1", "", BookmarkEvent::BookmarkAdded).when(Condition::and([
            Condition::url_contains(""),
            Condition::or(Vec::<Condition>::new()),
            Condition::imported_from_feed("feed"),
            Condition::has_tag(""),
        ]));

        let errors = rule.validate();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyName,
                ValidationError::MissingIdentifier {
                    path: "condition.children[0]".into(),
                    field: "substring"
                },
                ValidationError::EmptyCombinator {
                    path: "condition.children[1]".into(),
                    combinator: "or"
                },
                ValidationError::MissingIdentifier {
                    path: "condition.children[3]".into(),
                    field: "tag_id"
                },
                ValidationError::NoActions,
            ]
        );
    }

    #[test]
    fn zero_actions_are_rejected_even_with_valid_trigger() {
        let rule = Rule::new("r1", "noop", BookmarkEvent::Archived);
        assert_eq!(rule.validate(), vec![ValidationError::NoActions]);
    }

    #[test]
    fn action_identifiers_are_required() {
        let errors = validate_actions(&[
            Action::add_tag("ok"),
            Action::remove_tag(""),
            Action::DownloadFullPageArchive,
            Action::remove_from_list(""),
            Action::Unknown,
        ]);
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingIdentifier {
                    path: "actions[1]".into(),
                    field: "tag_id"
                },
                ValidationError::MissingIdentifier {
                    path: "actions[3]".into(),
                    field: "list_id"
                },
                ValidationError::Unsupported {
                    path: "actions[4]".into(),
                    kind: "action"
                },
            ]
        );
    }

    #[test]
    fn maximum_depth_is_accepted() {
        let condition = nested(MAX_CONDITION_DEPTH, Condition::IsArchived);
        assert!(validate_condition(&condition).is_empty());
    }

    #[test_case(1 ; "narrow")]
    #[test_case(8 ; "wide")]
    #[test_case(64 ; "very wide")]
    fn too_deep_reports_once_regardless_of_width(width: usize) {
        let wide_leaves = Condition::or((0..width).map(|_| Condition::has_tag("")));
        let condition = nested(MAX_CONDITION_DEPTH, wide_leaves);

        let errors = validate_condition(&condition);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::TooComplex { max_depth, .. } if *max_depth == MAX_CONDITION_DEPTH
        ));
    }

    #[test]
    fn too_deep_branch_does_not_hide_sibling_errors() {
        let deep = nested(MAX_CONDITION_DEPTH + 3, Condition::AlwaysTrue);
        let condition = Condition::or([deep, Condition::has_tag("")]);

        let errors = validate_condition(&condition);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ValidationError::TooComplex { .. }));
        assert_eq!(
            errors[1],
            ValidationError::MissingIdentifier {
                path: "condition.children[1]".into(),
                field: "tag_id"
            }
        );
    }

    #[test]
    fn errors_render_readable_messages() {
        let error = ValidationError::TooComplex {
            path: "condition.children[0]".into(),
            max_depth: 10,
        };
        assert_eq!(
            error.to_string(),
            "condition.children[0]: condition is too complex (maximum nesting depth is 10)"
        );
    }
}
