use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bookmark_core::config::AutomationConfig;
use bookmark_protocol::bookmark::BookmarkEvent;
use bookmark_rules::{
    BookmarkRepository, DispatchReport, JobDispatcher, RuleDispatcher, RuleError, RuleStore,
};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;

type Reply = oneshot::Sender<Result<DispatchReport, RuleError>>;

struct DispatchRequest {
    event: BookmarkEvent,
    bookmark_id: String,
    reply: Option<Reply>,
}

/// Runs rule dispatches in the background.
///
/// Every bookmark is pinned to one lane by hashing its id. A lane handles its
/// requests one at a time, so dispatches for the same bookmark never overlap
/// while different bookmarks progress concurrently.
pub struct AutomationService {
    lanes: Vec<mpsc::UnboundedSender<DispatchRequest>>,
    workers: Vec<JoinHandle<()>>,
}

impl AutomationService {
    pub fn start(dispatcher: RuleDispatcher, lane_count: usize) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let lane_count = lane_count.max(1);
        let mut lanes = Vec::with_capacity(lane_count);
        let mut workers = Vec::with_capacity(lane_count);

        for lane in 0..lane_count {
            let (sender, receiver) = mpsc::unbounded_channel();
            lanes.push(sender);
            workers.push(tokio::spawn(lane_loop(lane, dispatcher.clone(), receiver)));
        }

        info!(lanes = lane_count, "automation service started");
        Self { lanes, workers }
    }

    pub fn from_config(
        rules: Arc<dyn RuleStore>,
        repository: Arc<dyn BookmarkRepository>,
        jobs: Arc<dyn JobDispatcher>,
        config: &AutomationConfig,
    ) -> Self {
        let dispatcher = RuleDispatcher::from_config(rules, repository, jobs, config);
        Self::start(dispatcher, config.dispatch_lanes)
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Lane that serves `bookmark_id`. Stable for the lifetime of the service.
    pub fn lane_for(&self, bookmark_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        bookmark_id.hash(&mut hasher);
        (hasher.finish() % self.lanes.len() as u64) as usize
    }

    /// Hands an event over for background dispatch without waiting for it.
    pub fn emit(&self, event: BookmarkEvent, bookmark_id: &str) -> Result<(), EngineError> {
        self.send(event, bookmark_id, None)
    }

    /// Dispatches an event on its lane and waits for the report.
    pub async fn emit_and_wait(
        &self,
        event: BookmarkEvent,
        bookmark_id: &str,
    ) -> Result<DispatchReport, EngineError> {
        let (reply, response) = oneshot::channel();
        self.send(event, bookmark_id, Some(reply))?;
        let report = response.await.map_err(|_| EngineError::LaneStopped)??;
        Ok(report)
    }

    /// Stops accepting events and waits until every queued dispatch has run.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for result in join_all(self.workers).await {
            if let Err(err) = result {
                error!("dispatch lane crashed: {:?}", err);
            }
        }
        info!("automation service stopped");
    }

    fn send(
        &self,
        event: BookmarkEvent,
        bookmark_id: &str,
        reply: Option<Reply>,
    ) -> Result<(), EngineError> {
        let lane = self.lane_for(bookmark_id);
        let request = DispatchRequest {
            event,
            bookmark_id: bookmark_id.to_string(),
            reply,
        };
        self.lanes[lane]
            .send(request)
            .map_err(|_| EngineError::ShuttingDown)
    }
}

async fn lane_loop(
    lane: usize,
    dispatcher: Arc<RuleDispatcher>,
    mut receiver: mpsc::UnboundedReceiver<DispatchRequest>,
) {
    while let Some(request) = receiver.recv().await {
        debug!(lane, bookmark_id = %request.bookmark_id, event = %request.event, "lane picked up event");
        let result = dispatcher
            .dispatch(request.event, &request.bookmark_id)
            .await;

        match request.reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => {
                if let Err(err) = result {
                    warn!(lane, bookmark_id = %request.bookmark_id, error = %err, "background dispatch failed");
                }
            }
        }
    }
    debug!(lane, "dispatch lane drained");
}
