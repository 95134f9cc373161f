use std::sync::Arc;

use bookmark_automation::{
    Action, BookmarkEvent, BookmarkKind, BookmarkSnapshot, Condition, DispatchSettings,
    InMemoryBookmarkRepository, InMemoryJobQueue, InMemoryRuleStore, Rule, RuleDispatcher,
};
use test_case::test_case;

struct World {
    rules: InMemoryRuleStore,
    bookmarks: InMemoryBookmarkRepository,
    jobs: InMemoryJobQueue,
}

impl World {
    fn new() -> Self {
        Self {
            rules: InMemoryRuleStore::new(),
            bookmarks: InMemoryBookmarkRepository::new(),
            jobs: InMemoryJobQueue::new(),
        }
    }

    fn add_rule(&self, rule: Rule) -> anyhow::Result<()> {
        self.rules.create_rule("alice", rule, Some("alice".into()))?;
        Ok(())
    }

    fn dispatcher(&self, settings: DispatchSettings) -> RuleDispatcher {
        RuleDispatcher::new(
            Arc::new(self.rules.clone()),
            Arc::new(self.bookmarks.clone()),
            Arc::new(self.jobs.clone()),
            settings,
        )
    }

    fn bookmark(&self, id: &str) -> anyhow::Result<BookmarkSnapshot> {
        self.bookmarks
            .snapshot(id)
            .ok_or_else(|| anyhow::anyhow!("bookmark {id} missing"))
    }
}

#[tokio::test]
async fn arxiv_links_are_tagged_as_papers() -> anyhow::Result<()> {
    let world = World::new();
    world.add_rule(
        Rule::new("papers", "Tag arxiv papers", BookmarkEvent::BookmarkAdded)
            .when(Condition::url_contains("arxiv.org"))
            .then(Action::add_tag("paper")),
    )?;
    world.add_rule(
        Rule::new("videos", "Tag videos", BookmarkEvent::BookmarkAdded)
            .when(Condition::url_contains("youtube.com"))
            .then(Action::add_tag("video")),
    )?;
    world
        .bookmarks
        .insert(BookmarkSnapshot::link("b1", "alice", "https://arxiv.org/abs/1234"));
    world
        .bookmarks
        .insert(BookmarkSnapshot::link("b2", "alice", "https://example.com"));

    let report = world
        .dispatcher(DispatchSettings::default())
        .dispatch(BookmarkEvent::BookmarkAdded, "b1")
        .await?;

    assert_eq!(report.fired_rules(), vec!["papers"]);
    assert!(report.failures().is_empty());
    let paper = world.bookmark("b1")?;
    assert!(paper.has_tag("paper"));
    assert_eq!(paper.tag_ids.len(), 1);
    assert!(world.bookmark("b2")?.tag_ids.is_empty());
    Ok(())
}

#[tokio::test]
async fn archived_reading_list_rule_waits_for_archive() -> anyhow::Result<()> {
    let world = World::new();
    world.add_rule(
        Rule::new("shelve", "Shelve archived reads", BookmarkEvent::Archived)
            .when(Condition::and([
                Condition::has_tag("toread"),
                Condition::IsArchived,
            ]))
            .then(Action::add_to_list("done")),
    )?;
    world.add_rule(
        Rule::new("archive-on-fav", "Archive favourites", BookmarkEvent::Favourited)
            .then(Action::ArchiveBookmark),
    )?;
    world.bookmarks.insert(
        BookmarkSnapshot::builder("b1", "alice", BookmarkKind::Text)
            .tag("toread")
            .build(),
    );
    let dispatcher = world.dispatcher(DispatchSettings::default());

    let report = dispatcher.dispatch(BookmarkEvent::Archived, "b1").await?;
    assert!(report.fired_rules().is_empty());
    assert!(!world.bookmark("b1")?.in_list("done"));

    let report = dispatcher.dispatch(BookmarkEvent::Favourited, "b1").await?;
    assert_eq!(report.fired_rules(), vec!["archive-on-fav", "shelve"]);
    let bookmark = world.bookmark("b1")?;
    assert!(bookmark.archived);
    assert!(bookmark.in_list("done"));
    Ok(())
}

#[test_case(20 ; "default bound")]
#[test_case(5 ; "tight bound")]
#[tokio::test]
async fn mutually_triggering_rules_are_cut_off(max_chain_depth: usize) -> anyhow::Result<()> {
    let world = World::new();
    world.add_rule(
        Rule::new("a", "x brings y", BookmarkEvent::tag_added("x")).then(Action::add_tag("y")),
    )?;
    world.add_rule(
        Rule::new("b", "y brings x", BookmarkEvent::tag_added("y")).then(Action::add_tag("x")),
    )?;
    world
        .bookmarks
        .insert(BookmarkSnapshot::link("b1", "alice", "https://example.com"));

    let report = world
        .dispatcher(DispatchSettings {
            max_chain_depth,
            ..DispatchSettings::default()
        })
        .dispatch(BookmarkEvent::tag_added("x"), "b1")
        .await?;

    assert!(report.chain_truncated());
    assert_eq!(report.max_depth_reached(), max_chain_depth);
    let exceeded = &report.chain_errors[0];
    assert_eq!(exceeded.bookmark_id, "b1");
    assert_eq!(exceeded.chain.first(), Some(&BookmarkEvent::tag_added("x")));
    assert_eq!(exceeded.chain.len(), max_chain_depth + 2);
    assert!(exceeded.to_string().contains("tag_added(x) -> tag_added(y)"));
    Ok(())
}

#[test]
fn invalid_rules_never_reach_the_store() {
    let world = World::new();
    let err = world
        .add_rule(
            Rule::new("broken", " ", BookmarkEvent::tag_added(""))
                .when(Condition::or(Vec::<Condition>::new())),
        )
        .expect_err("invalid rule");
    assert!(err.to_string().contains("rule broken is invalid"));
    assert!(world.rules.list_rules("alice").is_empty());
}

#[tokio::test]
async fn archive_jobs_are_submitted_for_matching_rules() -> anyhow::Result<()> {
    let world = World::new();
    world.add_rule(
        Rule::new("keep", "Keep feed items", BookmarkEvent::BookmarkAdded)
            .when(Condition::and([
                Condition::imported_from_feed("rss-1"),
                Condition::BookmarkTypeIs {
                    kind: BookmarkKind::Link,
                },
            ]))
            .then(Action::DownloadFullPageArchive),
    )?;
    world.bookmarks.insert(
        BookmarkSnapshot::builder("b1", "alice", BookmarkKind::Link)
            .url("https://blog.example.com/post")
            .feed("rss-1")
            .build(),
    );

    world
        .dispatcher(DispatchSettings::default())
        .dispatch(BookmarkEvent::BookmarkAdded, "b1")
        .await?;

    let submitted = world.jobs.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].bookmark_id, "b1");
    assert_eq!(submitted[0].payload["archive_full_page_if_not_stored"], true);
    Ok(())
}
