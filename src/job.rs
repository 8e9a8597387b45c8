// src/job.rs

//! Normalized job definitions.
//!
//! A [`JobDefinition`] is what a [`JobConfig`] becomes once it has been
//! validated: the schedule is parsed, the work item is one of a closed set
//! of variants, and every setting has a concrete value. Nothing downstream
//! looks at the raw configuration shape again.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::defaults::{DEFAULT_CLASS_METHOD, DEFAULT_DATE_FORMAT, DEFAULT_SMTP_PORT};
use crate::config::model::{ClassSpec, JobConfig};
use crate::lock::LockId;
use crate::schedule::Schedule;
use crate::types::{Mailer, SmtpSecurity};

/// Canonical job name type.
pub type JobName = String;

/// The unit of executable logic a job carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A shell command.
    Shell { command: String },
    /// A function registered under `key` in the task registry.
    Function { key: String },
    /// A registered class, constructed with `args`, then `method(method_args)`.
    ClassMethod {
        class: String,
        args: Vec<String>,
        method: String,
        method_args: Vec<String>,
    },
}

impl WorkItem {
    /// Build the work item from a config with exactly one kind set.
    ///
    /// Returns `None` unless exactly one of `command`, `function` and
    /// `class` is present.
    pub fn from_config(cfg: &JobConfig) -> Option<WorkItem> {
        match (&cfg.command, &cfg.function, &cfg.class) {
            (Some(command), None, None) => Some(WorkItem::Shell {
                command: command.clone(),
            }),
            (None, Some(key), None) => Some(WorkItem::Function { key: key.clone() }),
            (None, None, Some(spec)) => Some(WorkItem::from_class_spec(spec)),
            _ => None,
        }
    }

    fn from_class_spec(spec: &ClassSpec) -> WorkItem {
        match spec {
            ClassSpec::Name(name) => WorkItem::ClassMethod {
                class: name.clone(),
                args: Vec::new(),
                method: DEFAULT_CLASS_METHOD.to_string(),
                method_args: Vec::new(),
            },
            ClassSpec::Full {
                name,
                args,
                method,
                method_args,
            } => WorkItem::ClassMethod {
                class: name.clone(),
                args: args.clone(),
                method: method
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_CLASS_METHOD.to_string()),
                method_args: method_args.as_ref().map(|a| a.to_vec()).unwrap_or_default(),
            },
        }
    }

    /// Whether this item runs on the in-process launch backend.
    pub fn runs_in_process(&self) -> bool {
        matches!(self, WorkItem::ClassMethod { .. })
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkItem::Shell { .. } => "shell",
            WorkItem::Function { .. } => "function",
            WorkItem::ClassMethod { .. } => "class",
        }
    }
}

/// SMTP parameters for the mail notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: Option<String>,
    pub sender_name: Option<String>,
    pub security: Option<SmtpSecurity>,
}

/// Fully resolved job settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub recipients: Vec<String>,
    pub mailer: Mailer,
    pub smtp: SmtpSettings,
    pub max_runtime: Option<Duration>,
    pub run_as: Option<String>,
    pub environment: Option<String>,
    pub run_on_host: Option<String>,
    pub output: Option<PathBuf>,
    pub date_format: String,
    pub enabled: bool,
    pub halt_dir: Option<PathBuf>,
    pub debug: bool,
    pub depends_on: Vec<JobName>,
    pub lock_dir: PathBuf,
    pub dependency_timeout: Option<Duration>,
}

impl JobSettings {
    /// Resolve a (merged) config bag. Keys still missing fall back to the
    /// built-in defaults.
    pub fn resolve(cfg: &JobConfig) -> JobSettings {
        JobSettings {
            recipients: cfg
                .recipients
                .as_ref()
                .map(|r| r.split_commas())
                .unwrap_or_default(),
            mailer: cfg.mailer.unwrap_or_default(),
            smtp: SmtpSettings {
                host: non_empty(&cfg.smtp_host),
                port: cfg.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
                username: non_empty(&cfg.smtp_username),
                password: cfg.smtp_password.clone(),
                sender: non_empty(&cfg.smtp_sender),
                sender_name: non_empty(&cfg.smtp_sender_name),
                security: cfg.smtp_security,
            },
            max_runtime: cfg.max_runtime.map(Duration::from_secs),
            run_as: non_empty(&cfg.run_as),
            environment: non_empty(&cfg.environment),
            run_on_host: non_empty(&cfg.run_on_host),
            output: cfg.output.clone().filter(|p| !p.as_os_str().is_empty()),
            date_format: cfg
                .date_format
                .clone()
                .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
            enabled: cfg.enabled.unwrap_or(true),
            halt_dir: cfg.halt_dir.clone().filter(|p| !p.as_os_str().is_empty()),
            debug: cfg.debug.unwrap_or(false),
            depends_on: cfg
                .depends_on
                .as_ref()
                .map(|d| d.split_commas())
                .unwrap_or_default(),
            lock_dir: cfg.lock_dir.clone().unwrap_or_else(std::env::temp_dir),
            dependency_timeout: cfg.dependency_timeout.map(Duration::from_secs),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

/// A validated job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    pub name: JobName,
    pub schedule: Schedule,
    pub work: WorkItem,
    pub settings: JobSettings,
}

impl JobDefinition {
    /// Lock identity of this job.
    pub fn lock_id(&self) -> LockId {
        LockId::new(&self.name, self.settings.environment.as_deref())
    }

    /// Lock identities of the jobs this one depends on (same environment).
    pub fn dependency_lock_ids(&self) -> Vec<LockId> {
        self.settings
            .depends_on
            .iter()
            .map(|dep| LockId::new(dep, self.settings.environment.as_deref()))
            .collect()
    }
}
