//! Core shared library for the bookmark automation workspace.
//!
//! This crate exposes the ambient primitives the engine crates depend on:
//! common errors, configuration loading and logging setup.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{load_automation_config, AutomationConfig, Environment};
pub use errors::{ConfigError, CoreError};
