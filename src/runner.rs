// src/runner.rs

//! One job run, start to finish.
//!
//! ```text
//! Pending -> CheckingOverrun -> Skipped
//!                            -> GateFailed -> Released
//!                            -> Running -> Succeeded | Failed -> Released
//! ```
//!
//! [`JobRunner::run`] never returns an error. Anything that goes wrong is
//! written to the job log as an `ERROR:` line, mailed, and reported in the
//! [`RunReport`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::deps::{DEFAULT_POLL_INTERVAL, DependencyWaiter};
use crate::errors::{CronlockError, Result};
use crate::exec::{ExecutionDispatcher, ExecutionResult, ExecutionStatus, TaskRegistry};
use crate::host::{self, Platform};
use crate::job::JobDefinition;
use crate::joblog::JobLog;
use crate::lock::{Lock, LockCoordinator};
use crate::notify::Notifier;

/// What crosses the launch boundary: the job plus the tick it was launched
/// for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub job: JobDefinition,
    pub tick: DateTime<Local>,
}

impl RunRequest {
    pub fn new(job: JobDefinition, tick: DateTime<Local>) -> Self {
        Self { job, tick }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    CheckingOverrun,
    Skipped,
    GateFailed,
    Running,
    Succeeded,
    Failed,
    Released,
}

/// Why a run did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotDue,
    Disabled,
    Halted,
    WrongHost { expected: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotDue => f.write_str("not due"),
            SkipReason::Disabled => f.write_str("disabled"),
            SkipReason::Halted => f.write_str("halt file present"),
            SkipReason::WrongHost { expected } => write!(f, "restricted to host '{expected}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub job: String,
    /// Terminal state of the run: `Skipped`, `GateFailed`, `Succeeded` or
    /// `Failed`.
    pub state: RunState,
    pub result: ExecutionResult,
    /// Whether this run took the job's lock (it is always released again).
    pub lock_acquired: bool,
}

pub struct JobRunner {
    dispatcher: ExecutionDispatcher,
    notifier: Arc<dyn Notifier>,
    host: String,
    platform: Platform,
    poll_interval: Duration,
}

impl JobRunner {
    pub fn new(registry: Arc<TaskRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            dispatcher: ExecutionDispatcher::new(registry),
            notifier,
            host: host::hostname(),
            platform: Platform::current(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the host name used for `run_on_host`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Poll interval of the dependency wait.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn run(&self, request: &RunRequest) -> RunReport {
        let job = &request.job;
        let log = JobLog::new(job.settings.output.clone(), job.settings.date_format.clone());
        let locks = LockCoordinator::new(&job.settings.lock_dir);

        let mut state = RunState::Pending;
        advance(&job.name, &mut state, RunState::CheckingOverrun);

        if let Err(e) = self.check_overrun(job, &locks) {
            let message = e.to_string();
            self.report_failure(job, &log, &message).await;
            advance(&job.name, &mut state, RunState::GateFailed);
            let outcome = state;
            advance(&job.name, &mut state, RunState::Released);
            return RunReport {
                job: job.name.clone(),
                state: outcome,
                result: ExecutionResult::failure(message),
                lock_acquired: false,
            };
        }

        if let Some(reason) = self.skip_reason(request) {
            debug!(job = %job.name, %reason, "skipping run");
            advance(&job.name, &mut state, RunState::Skipped);
            return RunReport {
                job: job.name.clone(),
                state,
                result: ExecutionResult::skipped(reason.to_string()),
                lock_acquired: false,
            };
        }

        advance(&job.name, &mut state, RunState::Running);
        let mut lock: Option<Lock> = None;
        let result = self.run_locked(job, &locks, &log, &mut lock).await;
        let lock_acquired = lock.is_some();

        let terminal = match &result.status {
            ExecutionStatus::Success => RunState::Succeeded,
            ExecutionStatus::Informational(message) => {
                info!(job = %job.name, %message, "run ended early");
                log.line(&format!("INFO: {message}"));
                RunState::Succeeded
            }
            ExecutionStatus::Failure(message) => {
                self.report_failure(job, &log, message).await;
                RunState::Failed
            }
            ExecutionStatus::Skipped(reason) => {
                debug!(job = %job.name, %reason, "work item skipped");
                RunState::Succeeded
            }
        };
        advance(&job.name, &mut state, terminal);
        let outcome = state;

        if let Some(lock) = lock {
            if let Err(e) = locks.release(lock) {
                warn!(job = %job.name, error = %e, "failed to release lock");
            }
        }
        if let Err(e) = log.remove_if_empty() {
            warn!(job = %job.name, error = %e, "failed to remove empty job log");
        }
        advance(&job.name, &mut state, RunState::Released);

        RunReport {
            job: job.name.clone(),
            state: outcome,
            result,
            lock_acquired,
        }
    }

    /// Take the lock, wait for dependencies, do the work. The acquired lock
    /// is handed back through `held` so the caller releases it on every path.
    async fn run_locked(
        &self,
        job: &JobDefinition,
        locks: &LockCoordinator,
        log: &JobLog,
        held: &mut Option<Lock>,
    ) -> ExecutionResult {
        match locks.acquire(&job.lock_id()) {
            Ok(lock) => *held = Some(lock),
            Err(e) => return ExecutionResult::failure(e.to_string()),
        }

        let deps = job.dependency_lock_ids();
        if !deps.is_empty() {
            let waiter = DependencyWaiter::new(locks.clone())
                .with_poll_interval(self.poll_interval)
                .with_timeout(job.settings.dependency_timeout);
            if let Err(e) = waiter.wait_all(&deps).await {
                return ExecutionResult::failure(e.to_string());
            }
        }

        info!(job = %job.name, kind = job.work.kind(), "running job");
        self.dispatcher.dispatch(job, log).await
    }

    /// Fails when the previous run of this job has been holding its lock
    /// for at least `max_runtime`.
    fn check_overrun(&self, job: &JobDefinition, locks: &LockCoordinator) -> Result<()> {
        let Some(max_runtime) = job.settings.max_runtime else {
            return Ok(());
        };

        if self.platform == Platform::Windows {
            return Err(CronlockError::ConfigError(
                "max_runtime is not supported on Windows".to_string(),
            ));
        }

        let Some(age) = locks.age(&job.lock_id())? else {
            return Ok(());
        };

        if age.as_secs() < max_runtime.as_secs() {
            return Ok(());
        }

        Err(CronlockError::MaxRuntimeExceeded {
            max_runtime: max_runtime.as_secs(),
            runtime: age.as_secs(),
        })
    }

    fn skip_reason(&self, request: &RunRequest) -> Option<SkipReason> {
        let job = &request.job;
        let settings = &job.settings;

        if !job.schedule.is_due(&request.tick) {
            return Some(SkipReason::NotDue);
        }
        if !settings.enabled {
            return Some(SkipReason::Disabled);
        }
        if let Some(dir) = &settings.halt_dir {
            if dir.join(&job.name).exists() {
                return Some(SkipReason::Halted);
            }
        }
        if let Some(expected) = &settings.run_on_host {
            if !expected.eq_ignore_ascii_case(&self.host) {
                return Some(SkipReason::WrongHost {
                    expected: expected.clone(),
                });
            }
        }
        None
    }

    async fn report_failure(&self, job: &JobDefinition, log: &JobLog, message: &str) {
        error!(job = %job.name, %message, "job failed");
        log.line(&format!("ERROR: {message}"));

        if job.settings.recipients.is_empty() {
            return;
        }
        if let Err(e) = self.notifier.notify(&job.name, &job.settings, message).await {
            warn!(job = %job.name, error = %e, "failed to send notification");
        }
    }
}

impl fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("dispatcher", &self.dispatcher)
            .field("host", &self.host)
            .field("platform", &self.platform)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

fn advance(job: &str, state: &mut RunState, next: RunState) {
    debug!(job, from = ?*state, to = ?next, "run state");
    *state = next;
}
