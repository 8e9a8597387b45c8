#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use cronlock::config::{ClassSpec, ConfigFile, JobConfig, RawConfigFile, StringList};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: JobConfig::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_config(mut self, config: JobConfig) -> Self {
        self.config.config = config;
        self
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
///
/// Every job starts out due every minute, bound to no host, and with its
/// lock directory set by the caller so tests never share `/tmp` locks.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    fn base(lock_dir: &Path) -> JobConfig {
        JobConfig {
            schedule: Some("* * * * *".to_string()),
            lock_dir: Some(lock_dir.to_path_buf()),
            environment: Some(String::new()),
            run_on_host: Some(cronlock::host::hostname()),
            ..JobConfig::default()
        }
    }

    pub fn command(cmd: &str, lock_dir: &Path) -> Self {
        Self {
            job: JobConfig {
                command: Some(cmd.to_string()),
                ..Self::base(lock_dir)
            },
        }
    }

    pub fn function(key: &str, lock_dir: &Path) -> Self {
        Self {
            job: JobConfig {
                function: Some(key.to_string()),
                ..Self::base(lock_dir)
            },
        }
    }

    pub fn class(name: &str, lock_dir: &Path) -> Self {
        Self {
            job: JobConfig {
                class: Some(ClassSpec::Name(name.to_string())),
                ..Self::base(lock_dir)
            },
        }
    }

    pub fn class_method(name: &str, args: &[&str], method: &str, method_args: &[&str], lock_dir: &Path) -> Self {
        Self {
            job: JobConfig {
                class: Some(ClassSpec::Full {
                    name: name.to_string(),
                    args: args.iter().map(|a| a.to_string()).collect(),
                    method: Some(method.to_string()),
                    method_args: Some(StringList::Many(
                        method_args.iter().map(|a| a.to_string()).collect(),
                    )),
                }),
                ..Self::base(lock_dir)
            },
        }
    }

    pub fn schedule(mut self, expr: &str) -> Self {
        self.job.schedule = Some(expr.to_string());
        self
    }

    pub fn output(mut self, path: &Path) -> Self {
        self.job.output = Some(path.to_path_buf());
        self
    }

    pub fn max_runtime(mut self, secs: u64) -> Self {
        self.job.max_runtime = Some(secs);
        self
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.job.enabled = Some(val);
        self
    }

    pub fn halt_dir(mut self, dir: &Path) -> Self {
        self.job.halt_dir = Some(dir.to_path_buf());
        self
    }

    pub fn run_on_host(mut self, host: &str) -> Self {
        self.job.run_on_host = Some(host.to_string());
        self
    }

    pub fn environment(mut self, env: &str) -> Self {
        self.job.environment = Some(env.to_string());
        self
    }

    pub fn recipients(mut self, recipients: &str) -> Self {
        self.job.recipients = Some(StringList::from(recipients));
        self
    }

    pub fn depends_on(mut self, deps: &str) -> Self {
        self.job.depends_on = Some(StringList::from(deps));
        self
    }

    pub fn dependency_timeout(mut self, secs: u64) -> Self {
        self.job.dependency_timeout = Some(secs);
        self
    }

    pub fn date_format(mut self, format: &str) -> Self {
        self.job.date_format = Some(format.to_string());
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
