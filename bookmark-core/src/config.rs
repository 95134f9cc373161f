use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ConfigError, CoreError};

/// Prefix used by [`AutomationConfig::from_env`].
pub const DEFAULT_ENV_PREFIX: &str = "AUTOMATION_";

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Tunables for rule dispatch and the job runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationConfig {
    pub environment: Environment,
    /// Maximum number of causally linked redispatches stemming from one received event.
    pub max_chain_depth: usize,
    /// Upper bound on a single job submission.
    pub job_submit_timeout: Duration,
    /// Number of single-consumer background dispatch lanes.
    pub dispatch_lanes: usize,
    pub job_workers: usize,
    /// Attempts per job before it is marked failed.
    pub job_max_attempts: u32,
    /// Whether an action skipped because its effect already holds still produces a follow-up event.
    pub redispatch_skipped: bool,
    pub log_level: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            max_chain_depth: 20,
            job_submit_timeout: Duration::from_millis(5_000),
            dispatch_lanes: 4,
            job_workers: 2,
            job_max_attempts: 3,
            redispatch_skipped: true,
            log_level: "info".to_string(),
        }
    }
}

impl AutomationConfig {
    /// Loads configuration from the process environment (`AUTOMATION_*`), reading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `RULES_`).
    /// Unset variables keep their defaults.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);
        let defaults = Self::default();

        let environment = read_var(&key("ENV"))?
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let max_chain_depth =
            parse_var(&key("MAX_CHAIN_DEPTH"))?.unwrap_or(defaults.max_chain_depth);

        let job_submit_timeout = parse_var::<u64>(&key("JOB_SUBMIT_TIMEOUT_MS"))?
            .map(Duration::from_millis)
            .unwrap_or(defaults.job_submit_timeout);

        let dispatch_lanes = parse_var(&key("DISPATCH_LANES"))?.unwrap_or(defaults.dispatch_lanes);
        let job_workers = parse_var(&key("JOB_WORKERS"))?.unwrap_or(defaults.job_workers);
        let job_max_attempts =
            parse_var(&key("JOB_MAX_ATTEMPTS"))?.unwrap_or(defaults.job_max_attempts);

        let redispatch_key = key("REDISPATCH_SKIPPED");
        let redispatch_skipped = match read_var(&redispatch_key)? {
            Some(raw) => parse_bool(&redispatch_key, &raw)?,
            None => defaults.redispatch_skipped,
        };

        let log_level = read_var(&key("LOG_LEVEL"))?.unwrap_or(defaults.log_level);

        let config = Self {
            environment,
            max_chain_depth,
            job_submit_timeout,
            dispatch_lanes,
            job_workers,
            job_max_attempts,
            redispatch_skipped,
            log_level,
        };
        config.check(prefix)?;
        debug!(prefix, environment = ?config.environment, "automation configuration loaded");
        Ok(config)
    }

    /// Whether the service is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    fn check(&self, prefix: &str) -> Result<(), ConfigError> {
        let positive = [
            ("DISPATCH_LANES", self.dispatch_lanes as u64),
            ("JOB_WORKERS", self.job_workers as u64),
            ("JOB_MAX_ATTEMPTS", u64::from(self.job_max_attempts)),
            (
                "JOB_SUBMIT_TIMEOUT_MS",
                u64::try_from(self.job_submit_timeout.as_millis()).unwrap_or(u64::MAX),
            ),
        ];
        for (suffix, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: format!("{}{}", prefix, suffix),
                    value: value.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Loads `AUTOMATION_*` config, reporting failures as [`CoreError`].
pub fn load_automation_config() -> Result<AutomationConfig, CoreError> {
    Ok(AutomationConfig::from_env()?)
}

fn read_var(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value.trim().to_string()).filter(|value| !value.is_empty())),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: key.to_string(),
        }),
    }
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    read_var(key)?
        .map(|raw| {
            raw.parse::<T>().map_err(|err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: err.to_string(),
            })
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
