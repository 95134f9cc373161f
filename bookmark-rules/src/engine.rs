use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bookmark_core::config::AutomationConfig;
use bookmark_protocol::bookmark::BookmarkEvent;
use tracing::{debug, info, warn};

use crate::error::{ChainDepthExceeded, RuleError};
use crate::executor::{ActionExecutor, SubmittedJobs};
use crate::jobs::JobDispatcher;
use crate::outcome::{DispatchReport, PassReport, RuleOutcome};
use crate::repository::BookmarkRepository;
use crate::store::RuleStore;

/// Knobs for a [`RuleDispatcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// Redispatches allowed past the originally received event.
    pub max_chain_depth: usize,
    pub job_submit_timeout: Duration,
    pub redispatch_skipped: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&AutomationConfig::default())
    }
}

impl From<&AutomationConfig> for DispatchSettings {
    fn from(config: &AutomationConfig) -> Self {
        Self {
            max_chain_depth: config.max_chain_depth,
            job_submit_timeout: config.job_submit_timeout,
            redispatch_skipped: config.redispatch_skipped,
        }
    }
}

/// Stage of a single dispatch pass, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Received,
    Matching,
    Evaluating,
    Executing,
    Done,
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchStage::Received => "received",
            DispatchStage::Matching => "matching",
            DispatchStage::Evaluating => "evaluating",
            DispatchStage::Executing => "executing",
            DispatchStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Event waiting to be dispatched, with the causal chain that produced it.
struct PendingEvent {
    chain: Vec<BookmarkEvent>,
}

impl PendingEvent {
    fn root(event: BookmarkEvent) -> Self {
        Self { chain: vec![event] }
    }

    fn event(&self) -> &BookmarkEvent {
        &self.chain[self.chain.len() - 1]
    }

    fn caused(&self, event: BookmarkEvent) -> Self {
        let mut chain = self.chain.clone();
        chain.push(event);
        Self { chain }
    }
}

/// Matches events to rules, evaluates their conditions and runs their actions.
///
/// Follow-up events produced by actions are dispatched breadth-first, one
/// chain depth at a time, until no new events appear or the maximum chain
/// depth is reached. Identical follow-ups at the same depth are dispatched once.
#[derive(Clone)]
pub struct RuleDispatcher {
    rules: Arc<dyn RuleStore>,
    repository: Arc<dyn BookmarkRepository>,
    executor: ActionExecutor,
    max_chain_depth: usize,
}

impl RuleDispatcher {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        repository: Arc<dyn BookmarkRepository>,
        jobs: Arc<dyn JobDispatcher>,
        settings: DispatchSettings,
    ) -> Self {
        let executor = ActionExecutor::new(repository.clone(), jobs)
            .with_submit_timeout(settings.job_submit_timeout)
            .with_redispatch_skipped(settings.redispatch_skipped);
        Self {
            rules,
            repository,
            executor,
            max_chain_depth: settings.max_chain_depth,
        }
    }

    pub fn from_config(
        rules: Arc<dyn RuleStore>,
        repository: Arc<dyn BookmarkRepository>,
        jobs: Arc<dyn JobDispatcher>,
        config: &AutomationConfig,
    ) -> Self {
        Self::new(rules, repository, jobs, DispatchSettings::from(config))
    }

    pub fn max_chain_depth(&self) -> usize {
        self.max_chain_depth
    }

    /// Dispatches `event` for a bookmark and every follow-up event it causes.
    ///
    /// Fails only when the bookmark or the rules for the original event
    /// cannot be loaded. Every other problem is recorded in the report.
    pub async fn dispatch(
        &self,
        event: BookmarkEvent,
        bookmark_id: &str,
    ) -> Result<DispatchReport, RuleError> {
        let origin = self.repository.get_snapshot(bookmark_id).await?;
        let user_id = origin.user_id;
        info!(bookmark_id, %user_id, %event, stage = %DispatchStage::Received, "dispatching event");

        let mut report = DispatchReport::new(bookmark_id);
        let mut submitted = SubmittedJobs::new();
        let mut frontier = vec![PendingEvent::root(event)];
        let mut depth = 0;

        while !frontier.is_empty() {
            let mut next: Vec<PendingEvent> = Vec::new();

            for pending in frontier {
                let (pass, follow_ups) = match self
                    .dispatch_pass(pending.event(), bookmark_id, &user_id, depth, &mut submitted)
                    .await
                {
                    Ok(result) => result,
                    Err(err) if depth == 0 => return Err(err),
                    Err(err) => {
                        warn!(bookmark_id, depth, event = %pending.event(), error = %err, "follow-up dispatch failed");
                        let mut pass = PassReport::new(pending.event().clone(), depth);
                        pass.load_error = Some(err.to_string());
                        report.passes.push(pass);
                        continue;
                    }
                };
                report.passes.push(pass);

                for follow_up in follow_ups {
                    if next.iter().all(|queued| queued.event() != &follow_up) {
                        next.push(pending.caused(follow_up));
                    }
                }
            }

            depth += 1;
            if depth > self.max_chain_depth {
                for pending in next {
                    let exceeded = ChainDepthExceeded {
                        bookmark_id: bookmark_id.to_string(),
                        max_depth: self.max_chain_depth,
                        chain: pending.chain,
                    };
                    warn!(bookmark_id, error = %exceeded, "rule chain truncated");
                    report.chain_errors.push(exceeded);
                }
                break;
            }
            frontier = next;
        }

        debug!(
            bookmark_id,
            passes = report.passes.len(),
            fired = report.fired_rules().len(),
            truncated = report.chain_truncated(),
            stage = %DispatchStage::Done,
            "dispatch finished"
        );
        Ok(report)
    }

    /// Runs one event against its candidate rules, in store order, re-reading
    /// the bookmark before each rule so earlier rules' effects are visible.
    async fn dispatch_pass(
        &self,
        event: &BookmarkEvent,
        bookmark_id: &str,
        user_id: &str,
        depth: usize,
        submitted: &mut SubmittedJobs,
    ) -> Result<(PassReport, Vec<BookmarkEvent>), RuleError> {
        let candidates = self
            .rules
            .list_enabled_rules_for_trigger(user_id, event.kind(), event.identifier())
            .await?;
        debug!(bookmark_id, %event, depth, candidates = candidates.len(), stage = %DispatchStage::Matching, "loaded candidate rules");

        let mut pass = PassReport::new(event.clone(), depth);
        let mut follow_ups = Vec::new();

        for rule in &candidates {
            let snapshot = match self.repository.get_snapshot(bookmark_id).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(rule_id = %rule.id, bookmark_id, error = %err, "could not refresh bookmark for rule");
                    pass.rules.push(RuleOutcome {
                        snapshot_error: Some(err),
                        ..RuleOutcome::skipped(rule.id.clone())
                    });
                    continue;
                }
            };

            debug!(rule_id = %rule.id, bookmark_id, stage = %DispatchStage::Evaluating, "evaluating rule");
            if !rule.condition.evaluate(&snapshot) {
                pass.rules.push(RuleOutcome::skipped(rule.id.clone()));
                continue;
            }

            info!(rule_id = %rule.id, bookmark_id, %event, depth, stage = %DispatchStage::Executing, "rule matched");
            let batch = self
                .executor
                .run_actions(&rule.id, &rule.actions, bookmark_id, submitted)
                .await;
            follow_ups.extend(batch.follow_ups);
            pass.rules.push(RuleOutcome {
                rule_id: rule.id.clone(),
                matched: true,
                snapshot_error: None,
                actions: batch.reports,
            });
        }

        Ok((pass, follow_ups))
    }
}
