use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookmark_automation::{
    load_rules, Automation, AutomationConfig, BookmarkEvent, BookmarkSnapshot,
    InMemoryBookmarkRepository, InMemoryRuleStore, JobHandler, JobStatus, JobTask,
};

const RULES: &str = r#"
rules:
  - id: papers
    name: Tag and archive papers
    event:
      type: bookmark_added
    condition:
      type: url_contains
      substring: arxiv.org
    actions:
      - type: add_tag
        tag_id: paper
      - type: download_full_page_archive
  - id: reading
    name: Queue papers for reading
    event:
      type: tag_added
      tag_id: paper
    actions:
      - type: add_to_list
        list_id: reading
"#;

#[derive(Default)]
struct CountingArchiver {
    archived: AtomicUsize,
}

#[async_trait]
impl JobHandler for CountingArchiver {
    async fn handle(&self, task: &JobTask) -> Result<serde_json::Value, String> {
        self.archived.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "bookmark_id": task.bookmark_id }))
    }
}

fn store_from_file() -> anyhow::Result<InMemoryRuleStore> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rules.yaml");
    std::fs::write(&path, RULES)?;

    let store = InMemoryRuleStore::new();
    for rule in load_rules(&path)? {
        store.create_rule("alice", rule, None)?;
    }
    Ok(store)
}

#[tokio::test]
async fn loaded_rules_run_in_the_background() -> anyhow::Result<()> {
    let bookmarks = InMemoryBookmarkRepository::new();
    for id in ["b1", "b2", "b3"] {
        bookmarks.insert(BookmarkSnapshot::link(id, "alice", format!("https://arxiv.org/abs/{id}")));
    }
    bookmarks.insert(BookmarkSnapshot::link("b4", "alice", "https://example.com"));

    let archiver = Arc::new(CountingArchiver::default());
    let config = AutomationConfig {
        dispatch_lanes: 2,
        ..AutomationConfig::default()
    };
    let automation = Automation::start(
        config,
        Arc::new(store_from_file()?),
        Arc::new(bookmarks.clone()),
        archiver.clone(),
    );

    for id in ["b1", "b2", "b3"] {
        automation.service().emit(BookmarkEvent::BookmarkAdded, id)?;
    }
    let report = automation
        .service()
        .emit_and_wait(BookmarkEvent::BookmarkAdded, "b4")
        .await?;
    assert!(report.fired_rules().is_empty());

    let mut done = false;
    for _ in 0..400 {
        let finished = ["b1", "b2", "b3"].iter().all(|id| {
            let records = automation.jobs().list_for_bookmark(id);
            records.len() == 1 && records[0].status == JobStatus::Completed
        });
        if finished {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(done, "archive jobs did not complete");
    automation.shutdown().await;

    assert_eq!(archiver.archived.load(Ordering::SeqCst), 3);
    for id in ["b1", "b2", "b3"] {
        let bookmark = bookmarks
            .snapshot(id)
            .ok_or_else(|| anyhow::anyhow!("bookmark {id} missing"))?;
        assert!(bookmark.has_tag("paper"));
        assert!(bookmark.in_list("reading"));
    }
    Ok(())
}

#[tokio::test]
async fn events_after_shutdown_are_refused() -> anyhow::Result<()> {
    let automation = Automation::start(
        AutomationConfig::default(),
        Arc::new(InMemoryRuleStore::new()),
        Arc::new(InMemoryBookmarkRepository::new()),
        Arc::new(CountingArchiver::default()),
    );
    assert_eq!(automation.service().lane_count(), automation.config().dispatch_lanes);

    let jobs = automation.jobs().clone();
    automation.shutdown().await;

    assert!(jobs
        .submit_request(bookmark_automation::JobRequest::full_page_archive("b1"))
        .is_err());
    Ok(())
}
