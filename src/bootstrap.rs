use std::sync::Arc;

use bookmark_core::logging::init_tracing;
use bookmark_core::{load_automation_config, AutomationConfig};
use bookmark_engine::{AutomationService, JobHandler, JobQueueHandle, JobRuntime};
use bookmark_rules::{BookmarkRepository, RuleStore};
use tracing::info;

/// Loads `AUTOMATION_*` configuration and installs the tracing subscriber.
pub fn init_from_env() -> anyhow::Result<AutomationConfig> {
    let config = load_automation_config()?;
    init_tracing(Some(&config.log_level))?;
    info!(environment = ?config.environment, max_chain_depth = config.max_chain_depth, "configuration loaded");
    Ok(config)
}

/// Running automation: dispatch lanes backed by a job runtime.
pub struct Automation {
    config: AutomationConfig,
    service: AutomationService,
    runtime: JobRuntime,
    jobs: JobQueueHandle,
}

impl Automation {
    /// Starts the job workers and dispatch lanes. Must be called inside a
    /// Tokio runtime.
    pub fn start<H>(
        config: AutomationConfig,
        rules: Arc<dyn RuleStore>,
        repository: Arc<dyn BookmarkRepository>,
        handler: Arc<H>,
    ) -> Self
    where
        H: JobHandler,
    {
        let mut runtime = JobRuntime::new(config.job_max_attempts);
        runtime.start(handler, config.job_workers);
        let jobs = runtime.handle();

        let service =
            AutomationService::from_config(rules, repository, Arc::new(jobs.clone()), &config);

        Self {
            config,
            service,
            runtime,
            jobs,
        }
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn service(&self) -> &AutomationService {
        &self.service
    }

    pub fn jobs(&self) -> &JobQueueHandle {
        &self.jobs
    }

    /// Drains queued dispatches first so their jobs are accepted, then stops
    /// the job workers.
    pub async fn shutdown(self) {
        self.service.shutdown().await;
        self.runtime.shutdown().await;
    }
}
