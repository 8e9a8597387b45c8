// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CronlockError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid schedule '{expression}': {reason}")]
    Schedule { expression: String, reason: String },

    #[error("Job is still locked (Lockfile: {})!", path.display())]
    LockHeld { path: PathBuf },

    #[error("MaxRuntime of {max_runtime} secs exceeded! Current runtime: {runtime} secs")]
    MaxRuntimeExceeded { max_runtime: u64, runtime: u64 },

    #[error("Timed out after {waited} secs waiting for dependencies: {}", pending.join(", "))]
    DependencyTimeout { waited: u64, pending: Vec<String> },

    #[error("Launch error: {0}")]
    Launch(String),

    #[error("Malformed job encoding: {0}")]
    Wire(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CronlockError {
    pub(crate) fn schedule(expression: &str, reason: impl Into<String>) -> Self {
        CronlockError::Schedule {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CronlockError>;
