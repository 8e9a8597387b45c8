// src/exec/mod.rs

//! Execution strategies.
//!
//! [`ExecutionDispatcher`] runs exactly one strategy for a job's
//! [`WorkItem`](crate::job::WorkItem) and reports an [`ExecutionResult`].
//! Strategies never retry and never return an error: every failure is part
//! of the result.

pub mod class;
pub mod function;
pub mod registry;
pub mod shell;

use std::sync::Arc;

use tracing::debug;

use crate::job::{JobDefinition, WorkItem};
use crate::joblog::JobLog;

pub use registry::{JobClass, TaskError, TaskRegistry, TaskResult};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure(String),
    Skipped(String),
    Informational(String),
}

/// Status plus whatever the work item wrote (empty for shell commands,
/// whose output goes straight to the log sink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub output: String,
}

impl ExecutionResult {
    pub fn success(output: String) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failure(message.into()),
            output: String::new(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Skipped(reason.into()),
            output: String::new(),
        }
    }

    pub fn informational(message: impl Into<String>, output: String) -> Self {
        Self {
            status: ExecutionStatus::Informational(message.into()),
            output,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Success)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionDispatcher {
    registry: Arc<TaskRegistry>,
}

impl ExecutionDispatcher {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    /// Run `job`'s work item, appending its output to `log`.
    pub async fn dispatch(&self, job: &JobDefinition, log: &JobLog) -> ExecutionResult {
        debug!(job = %job.name, kind = job.work.kind(), "dispatching work item");

        match &job.work {
            WorkItem::Shell { command } => shell::run_shell(command, &job.settings, log).await,
            WorkItem::Function { key } => function::run_function(key, &self.registry, log),
            WorkItem::ClassMethod {
                class,
                args,
                method,
                method_args,
            } => {
                class::run_class_method(class, args, method, method_args, &self.registry, log)
                    .await
            }
        }
    }
}
