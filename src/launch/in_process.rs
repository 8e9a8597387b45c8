// src/launch/in_process.rs

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::errors::{CronlockError, Result};
use crate::launch::{Launched, Launcher};
use crate::runner::{JobRunner, RunRequest};

/// Runs the job on a task of the current tokio runtime.
#[derive(Debug, Clone)]
pub struct InProcessLauncher {
    runner: Arc<JobRunner>,
}

impl InProcessLauncher {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }
}

impl Launcher for InProcessLauncher {
    fn launch(&self, request: RunRequest) -> Result<Launched> {
        let handle = Handle::try_current().map_err(|e| {
            CronlockError::Launch(format!("no runtime for '{}': {e}", request.job.name))
        })?;

        info!(job = %request.job.name, "launching in-process worker");
        let runner = Arc::clone(&self.runner);
        Ok(Launched::Worker(handle.spawn(async move {
            runner.run(&request).await
        })))
    }
}
