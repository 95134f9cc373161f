use bookmark_protocol::bookmark::{BookmarkKind, BookmarkSnapshot};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Boolean expression evaluated against a [`BookmarkSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Matches every bookmark.
    AlwaysTrue,
    /// Link bookmark whose URL contains the substring. Case-sensitive.
    UrlContains { substring: String },
    /// Bookmark created by the import record of the given RSS feed.
    ImportedFromFeed { feed_id: String },
    /// Stored content kind equals `kind`.
    BookmarkTypeIs { kind: BookmarkKind },
    /// Bookmark currently carries the tag.
    HasTag { tag_id: String },
    IsFavourited,
    IsArchived,
    /// All children must hold.
    And { children: Vec<Condition> },
    /// At least one child must hold.
    Or { children: Vec<Condition> },
    /// A condition type this build does not understand. Never matches.
    #[serde(other)]
    Unknown,
}

impl Condition {
    pub fn always() -> Self {
        Condition::AlwaysTrue
    }

    pub fn url_contains(substring: impl Into<String>) -> Self {
        Condition::UrlContains {
            substring: substring.into(),
        }
    }

    pub fn imported_from_feed(feed_id: impl Into<String>) -> Self {
        Condition::ImportedFromFeed {
            feed_id: feed_id.into(),
        }
    }

    pub fn has_tag(tag_id: impl Into<String>) -> Self {
        Condition::HasTag {
            tag_id: tag_id.into(),
        }
    }

    pub fn and(children: impl IntoIterator<Item = Condition>) -> Self {
        Condition::And {
            children: children.into_iter().collect(),
        }
    }

    pub fn or(children: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Or {
            children: children.into_iter().collect(),
        }
    }

    /// Variant name as it appears in serialized rules.
    pub fn name(&self) -> &'static str {
        match self {
            Condition::AlwaysTrue => "always_true",
            Condition::UrlContains { .. } => "url_contains",
            Condition::ImportedFromFeed { .. } => "imported_from_feed",
            Condition::BookmarkTypeIs { .. } => "bookmark_type_is",
            Condition::HasTag { .. } => "has_tag",
            Condition::IsFavourited => "is_favourited",
            Condition::IsArchived => "is_archived",
            Condition::And { .. } => "and",
            Condition::Or { .. } => "or",
            Condition::Unknown => "unknown",
        }
    }

    /// Evaluates the condition against a materialized snapshot.
    ///
    /// Pure and total: combinators short-circuit, an empty `and` holds
    /// vacuously, an empty `or` never holds, and unknown variants fail closed.
    pub fn evaluate(&self, snapshot: &BookmarkSnapshot) -> bool {
        match self {
            Condition::AlwaysTrue => true,
            Condition::UrlContains { substring } => {
                snapshot.is_link()
                    && snapshot
                        .url
                        .as_deref()
                        .map(|url| url.contains(substring.as_str()))
                        .unwrap_or(false)
            }
            Condition::ImportedFromFeed { feed_id } => snapshot.imported_from(feed_id),
            Condition::BookmarkTypeIs { kind } => snapshot.kind == *kind,
            Condition::HasTag { tag_id } => snapshot.has_tag(tag_id),
            Condition::IsFavourited => snapshot.favourited,
            Condition::IsArchived => snapshot.archived,
            Condition::And { children } => children.iter().all(|child| child.evaluate(snapshot)),
            Condition::Or { children } => children.iter().any(|child| child.evaluate(snapshot)),
            Condition::Unknown => {
                warn!(bookmark_id = %snapshot.id, "unknown condition type evaluated as false");
                false
            }
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::always()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn link(url: &str) -> BookmarkSnapshot {
        BookmarkSnapshot::builder("b1", "u1", BookmarkKind::Link)
            .url(url)
            .tag("toread")
            .feed("hn")
            .favourited(true)
            .build()
    }

    #[test_case(Condition::always(), true ; "always")]
    #[test_case(Condition::url_contains("arxiv.org"), true ; "url substring")]
    #[test_case(Condition::url_contains("ARXIV.org"), false ; "url is case sensitive")]
    #[test_case(Condition::imported_from_feed("hn"), true ; "feed origin")]
    #[test_case(Condition::imported_from_feed("lobsters"), false ; "other feed")]
    #[test_case(Condition::BookmarkTypeIs { kind: BookmarkKind::Link }, true ; "kind link")]
    #[test_case(Condition::BookmarkTypeIs { kind: BookmarkKind::Asset }, false ; "kind asset")]
    #[test_case(Condition::has_tag("toread"), true ; "has tag")]
    #[test_case(Condition::has_tag("paper"), false ; "missing tag")]
    #[test_case(Condition::IsFavourited, true ; "favourited")]
    #[test_case(Condition::IsArchived, false ; "not archived")]
    #[test_case(Condition::Unknown, false ; "unknown fails closed")]
    fn leaf_semantics(condition: Condition, expected: bool) {
        let snapshot = link("https://arxiv.org/abs/1234");
        assert_eq!(condition.evaluate(&snapshot), expected);
    }

    #[test]
    fn url_contains_requires_link_bookmark() {
        let text = BookmarkSnapshot::builder("b2", "u1", BookmarkKind::Text)
            .url("https://arxiv.org/abs/1234")
            .build();
        assert!(!Condition::url_contains("arxiv").evaluate(&text));
    }

    #[test]
    fn empty_combinators_follow_vacuous_truth() {
        let snapshot = link("https://example.com");
        assert!(Condition::and(Vec::<Condition>::new()).evaluate(&snapshot));
        assert!(!Condition::or(Vec::<Condition>::new()).evaluate(&snapshot));
    }

    #[test]
    fn unknown_type_deserializes_and_fails_closed() {
        let raw = r#"{"type": "and", "children": [{"type": "has_ai_summary"}, {"type": "always_true"}]}"#;
        let condition: Condition = serde_json::from_str(raw).expect("condition");
        assert_eq!(
            condition,
            Condition::and([Condition::Unknown, Condition::AlwaysTrue])
        );
        assert!(!condition.evaluate(&link("https://example.com")));
    }

    fn arb_snapshot() -> impl Strategy<Value = BookmarkSnapshot> {
        (
            prop_oneof![
                Just(BookmarkKind::Link),
                Just(BookmarkKind::Text),
                Just(BookmarkKind::Asset)
            ],
            prop::sample::select(vec!["https://arxiv.org/abs/1", "https://example.com/a"]),
            prop::collection::btree_set(prop::sample::select(vec!["a", "b", "c"]), 0..3),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(kind, url, tags, favourited, archived)| {
                let mut builder = BookmarkSnapshot::builder("b", "u", kind)
                    .url(url)
                    .favourited(favourited)
                    .archived(archived);
                for tag in tags {
                    builder = builder.tag(tag);
                }
                builder.build()
            })
    }

    fn arb_condition() -> impl Strategy<Value = Condition> {
        let leaf = prop_oneof![
            Just(Condition::AlwaysTrue),
            Just(Condition::IsFavourited),
            Just(Condition::IsArchived),
            prop::sample::select(vec!["a", "b", "c"]).prop_map(|tag| Condition::has_tag(tag)),
            prop::sample::select(vec!["arxiv", "example"]).prop_map(|needle| Condition::url_contains(needle)),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(|children| Condition::and(children)),
                prop::collection::vec(inner, 1..4).prop_map(|children| Condition::or(children)),
            ]
        })
    }

    proptest! {
        #[test]
        fn single_child_combinators_are_identity(
            condition in arb_condition(),
            snapshot in arb_snapshot(),
        ) {
            let expected = condition.evaluate(&snapshot);
            prop_assert_eq!(Condition::and([condition.clone()]).evaluate(&snapshot), expected);
            prop_assert_eq!(Condition::or([condition]).evaluate(&snapshot), expected);
        }

        #[test]
        fn combinators_match_all_and_any(
            children in prop::collection::vec(arb_condition(), 1..5),
            snapshot in arb_snapshot(),
        ) {
            let all = children.iter().all(|child| child.evaluate(&snapshot));
            let any = children.iter().any(|child| child.evaluate(&snapshot));
            prop_assert_eq!(Condition::and(children.clone()).evaluate(&snapshot), all);
            prop_assert_eq!(Condition::or(children).evaluate(&snapshot), any);
        }
    }
}
