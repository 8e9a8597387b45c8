// src/scheduler.rs

//! The job registry and the tick.
//!
//! A [`Scheduler`] holds validated jobs. [`Scheduler::run`] is one tick:
//! every job whose schedule is due this minute is handed to a launcher and
//! the tick moves on. It never waits for a run, and a run's failure is
//! never visible here; that goes to the job log and the notifier.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::config::model::{ConfigFile, JobConfig};
use crate::config::validate::{check_dependency_graph, validate_job};
use crate::errors::Result;
use crate::exec::TaskRegistry;
use crate::job::{JobDefinition, JobName, JobSettings, WorkItem};
use crate::launch::{InProcessLauncher, Launched, Launcher, ProcessLauncher};
use crate::notify::{MailNotifier, Notifier};
use crate::runner::{JobRunner, RunReport, RunRequest};
use crate::schedule::Schedule;

/// A job as registered: parsed and checked, but not yet merged with the
/// scheduler config, so that [`Scheduler::set_config`] still applies.
#[derive(Debug, Clone)]
struct RegisteredJob {
    name: JobName,
    schedule: Schedule,
    work: WorkItem,
    config: JobConfig,
}

pub struct Scheduler {
    config: JobConfig,
    jobs: Vec<RegisteredJob>,
    process_launcher: Arc<dyn Launcher>,
    worker_launcher: Arc<dyn Launcher>,
}

impl Scheduler {
    /// New scheduler with `config` layered over [`JobConfig::defaults`].
    ///
    /// Class jobs resolve against an empty registry until
    /// [`Scheduler::with_registry`] is called.
    pub fn new(config: JobConfig) -> Self {
        let runner = JobRunner::new(Arc::new(TaskRegistry::new()), Arc::new(MailNotifier::new()));
        Self {
            config: JobConfig::defaults().merge(&config),
            jobs: Vec::new(),
            process_launcher: Arc::new(ProcessLauncher::new()),
            worker_launcher: Arc::new(InProcessLauncher::new(Arc::new(runner))),
        }
    }

    /// Scheduler holding every job of a validated config file.
    pub fn from_config(file: &ConfigFile) -> Result<Self> {
        let mut scheduler = Scheduler::new(file.config.clone());
        for (name, job) in &file.job {
            scheduler.add(name, job.clone())?;
        }
        Ok(scheduler)
    }

    /// Registry and notifier for jobs run in this process.
    pub fn with_registry(mut self, registry: Arc<TaskRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        let runner = JobRunner::new(registry, notifier);
        self.worker_launcher = Arc::new(InProcessLauncher::new(Arc::new(runner)));
        self
    }

    /// Executable started for process-launched jobs.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.process_launcher = Arc::new(ProcessLauncher::with_program(program));
        self
    }

    /// Backend for shell and function jobs.
    pub fn with_process_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.process_launcher = launcher;
        self
    }

    pub fn with_launchers(mut self, process: Arc<dyn Launcher>, worker: Arc<dyn Launcher>) -> Self {
        self.process_launcher = process;
        self.worker_launcher = worker;
        self
    }

    /// Replace the scheduler-wide config (layered over the defaults).
    pub fn set_config(&mut self, config: JobConfig) {
        self.config = JobConfig::defaults().merge(&config);
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Register `name`, replacing a job of the same name.
    pub fn add(&mut self, name: &str, config: JobConfig) -> Result<()> {
        let (schedule, work) = validate_job(name, &config)?;

        let mut graph: Vec<(String, Vec<String>)> = self
            .jobs
            .iter()
            .filter(|j| j.name != name)
            .map(|j| (j.name.clone(), depends_on(&j.config)))
            .collect();
        graph.push((name.to_string(), depends_on(&config)));
        check_dependency_graph(graph)?;

        debug!(job = name, schedule = %schedule, kind = work.kind(), "registered job");

        let job = RegisteredJob {
            name: name.to_string(),
            schedule,
            work,
            config,
        };
        match self.jobs.iter_mut().find(|j| j.name == name) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
        Ok(())
    }

    /// Resolved definitions of every registered job, in registration order.
    pub fn jobs(&self) -> Vec<JobDefinition> {
        self.jobs.iter().map(|j| self.resolve(j)).collect()
    }

    fn resolve(&self, job: &RegisteredJob) -> JobDefinition {
        JobDefinition {
            name: job.name.clone(),
            schedule: job.schedule.clone(),
            work: job.work.clone(),
            settings: JobSettings::resolve(&self.config.merge(&job.config)),
        }
    }

    /// One tick at the current local time.
    pub fn run(&self) -> TickReport {
        self.run_at(Local::now())
    }

    /// One tick at `now`.
    pub fn run_at(&self, now: DateTime<Local>) -> TickReport {
        let mut report = TickReport::default();

        for registered in &self.jobs {
            if !registered.schedule.is_due(&now) {
                continue;
            }

            let job = self.resolve(registered);
            let name = job.name.clone();
            let launcher = if job.work.runs_in_process() {
                &self.worker_launcher
            } else {
                &self.process_launcher
            };

            match launcher.launch(RunRequest::new(job, now)) {
                Ok(launched) => report.launched.push((name, launched)),
                Err(e) => {
                    error!(job = %name, error = %e, "failed to launch job");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        info!(
            launched = report.launched.len(),
            failed = report.failed.len(),
            "tick complete"
        );
        report
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

fn depends_on(config: &JobConfig) -> Vec<String> {
    config
        .depends_on
        .as_ref()
        .map(|d| d.split_commas())
        .unwrap_or_default()
}

/// What one tick launched.
#[derive(Debug, Default)]
pub struct TickReport {
    pub launched: Vec<(JobName, Launched)>,
    pub failed: Vec<(JobName, String)>,
}

impl TickReport {
    pub fn launched_names(&self) -> Vec<&str> {
        self.launched.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Wait for the in-process workers of this tick. Runner processes are
    /// left alone.
    pub async fn wait_workers(self) -> Vec<RunReport> {
        let mut reports = Vec::new();
        for (name, launched) in self.launched {
            if let Launched::Worker(handle) = launched {
                match handle.await {
                    Ok(report) => reports.push(report),
                    Err(e) => warn!(job = %name, error = %e, "in-process worker failed"),
                }
            }
        }
        reports
    }

    /// Wait for the runner processes of this tick. Only meaningful when
    /// `SIGCHLD` is not ignored.
    pub fn wait_processes(&mut self) -> Result<()> {
        for (name, launched) in &mut self.launched {
            if let Launched::Process(child) = launched {
                let status = child.wait()?;
                debug!(job = %name, ?status, "runner process exited");
            }
        }
        Ok(())
    }
}
