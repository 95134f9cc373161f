use std::io;

use thiserror::Error;

/// Result type used across the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Canonical error representation shared by the automation crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("{0}")]
    General(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::General(err.to_string())
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("environment variable {key} is not valid unicode")]
    NotUnicode { key: String },
}

impl From<ConfigError> for CoreError {
    fn from(value: ConfigError) -> Self {
        CoreError::Config(value.to_string())
    }
}
