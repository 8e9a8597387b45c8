// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{Mailer, SmtpSecurity};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// recipients = "ops@example.com"
/// output = "/var/log/cronlock.log"
///
/// [job.backup]
/// schedule = "0 3 * * *"
/// command = "tar czf /srv/backup.tgz /srv/data"
/// max_runtime = 3600
///
/// [job.report]
/// schedule = "*/15 * * * *"
/// class = { name = "Report", args = ["daily"], method = "send" }
/// depends_on = ["backup"]
/// ```
///
/// `[config]` is the scheduler-wide configuration every job is merged over.
/// Unknown keys are ignored everywhere.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: JobConfig,

    /// Keys are the job names.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// A [`RawConfigFile`] that passed validation (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: JobConfig,
    pub job: BTreeMap<String, JobConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: JobConfig, job: BTreeMap<String, JobConfig>) -> Self {
        Self { config, job }
    }
}

/// The configuration bag of a job (or of the whole scheduler).
///
/// Every key is optional so that bags can be layered: the default table,
/// then the scheduler-wide config, then the job's own config. See
/// [`JobConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct JobConfig {
    /// Cron expression, macro or one-shot date-time. Required per job.
    #[serde(default)]
    pub schedule: Option<String>,

    /// Shell command to run.
    #[serde(default)]
    pub command: Option<String>,

    /// Key of a function in the task registry.
    #[serde(default)]
    pub function: Option<String>,

    /// Class to instantiate and call.
    #[serde(default)]
    pub class: Option<ClassSpec>,

    /// Who gets mail when the job fails. Comma-separated string or list.
    #[serde(default)]
    pub recipients: Option<StringList>,

    #[serde(default)]
    pub mailer: Option<Mailer>,

    /// Seconds after which a still-running previous run counts as overrun.
    #[serde(default)]
    pub max_runtime: Option<u64>,

    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub smtp_sender: Option<String>,
    #[serde(default)]
    pub smtp_sender_name: Option<String>,
    #[serde(default)]
    pub smtp_security: Option<SmtpSecurity>,

    /// Run shell commands as this user (requires root).
    #[serde(default)]
    pub run_as: Option<String>,

    /// Namespace for lock files.
    #[serde(default)]
    pub environment: Option<String>,

    /// Only run on this host (compared case-insensitively).
    #[serde(default)]
    pub run_on_host: Option<String>,

    /// Log file the job's output and status lines are appended to.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// `strftime` format for log line timestamps.
    #[serde(default)]
    pub date_format: Option<String>,

    #[serde(default)]
    pub enabled: Option<bool>,

    /// A file named like the job in this directory suppresses it.
    #[serde(default)]
    pub halt_dir: Option<PathBuf>,

    #[serde(default)]
    pub debug: Option<bool>,

    /// Jobs that must not be running when this one starts its work.
    #[serde(default)]
    pub depends_on: Option<StringList>,

    /// Directory that holds the lock files.
    #[serde(default)]
    pub lock_dir: Option<PathBuf>,

    /// Give up waiting for dependencies after this many seconds.
    #[serde(default)]
    pub dependency_timeout: Option<u64>,
}

impl JobConfig {
    /// Layer `over` on top of `self`; keys set in `over` win.
    pub fn merge(&self, over: &JobConfig) -> JobConfig {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }

        JobConfig {
            schedule: pick(&self.schedule, &over.schedule),
            command: pick(&self.command, &over.command),
            function: pick(&self.function, &over.function),
            class: pick(&self.class, &over.class),
            recipients: pick(&self.recipients, &over.recipients),
            mailer: pick(&self.mailer, &over.mailer),
            max_runtime: pick(&self.max_runtime, &over.max_runtime),
            smtp_host: pick(&self.smtp_host, &over.smtp_host),
            smtp_port: pick(&self.smtp_port, &over.smtp_port),
            smtp_username: pick(&self.smtp_username, &over.smtp_username),
            smtp_password: pick(&self.smtp_password, &over.smtp_password),
            smtp_sender: pick(&self.smtp_sender, &over.smtp_sender),
            smtp_sender_name: pick(&self.smtp_sender_name, &over.smtp_sender_name),
            smtp_security: pick(&self.smtp_security, &over.smtp_security),
            run_as: pick(&self.run_as, &over.run_as),
            environment: pick(&self.environment, &over.environment),
            run_on_host: pick(&self.run_on_host, &over.run_on_host),
            output: pick(&self.output, &over.output),
            date_format: pick(&self.date_format, &over.date_format),
            enabled: pick(&self.enabled, &over.enabled),
            halt_dir: pick(&self.halt_dir, &over.halt_dir),
            debug: pick(&self.debug, &over.debug),
            depends_on: pick(&self.depends_on, &over.depends_on),
            lock_dir: pick(&self.lock_dir, &over.lock_dir),
            dependency_timeout: pick(&self.dependency_timeout, &over.dependency_timeout),
        }
    }
}

/// `class = "Name"` or `class = { name = "Name", args = [...], method = "m", method_args = ... }`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ClassSpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        method_args: Option<StringList>,
    },
}

/// Either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    /// The values as given; a single string is a single value.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            StringList::One(s) => vec![s.clone()],
            StringList::Many(v) => v.clone(),
        }
    }

    /// The values with single strings split on commas (`"a, b"` → `["a", "b"]`).
    /// Empty entries are dropped.
    pub fn split_commas(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            StringList::One(s) => s.split(',').collect(),
            StringList::Many(v) => v.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl From<&str> for StringList {
    fn from(value: &str) -> Self {
        StringList::One(value.to_string())
    }
}

impl From<Vec<String>> for StringList {
    fn from(value: Vec<String>) -> Self {
        StringList::Many(value)
    }
}
