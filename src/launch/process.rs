// src/launch/process.rs

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::{debug, info};

use crate::config::wire;
use crate::errors::{CronlockError, Result};
use crate::launch::{Launched, Launcher};
use crate::runner::RunRequest;

/// Name of the hidden subcommand a runner process is started with.
pub const RUN_JOB_COMMAND: &str = "run-job";

/// File in the working directory that receives a runner's own output when
/// the job has `debug` set.
const DEBUG_LOG: &str = "debug.log";

/// Starts `<program> run-job <job> <encoded>` and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    program: Option<PathBuf>,
}

impl ProcessLauncher {
    /// Launch the current executable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch `program` instead of the current executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(p) => Ok(p.clone()),
            None => std::env::current_exe().map_err(|e| {
                CronlockError::Launch(format!("cannot determine current executable: {e}"))
            }),
        }
    }

    /// Command line for `request`, without spawning it.
    pub fn command(&self, request: &RunRequest) -> Result<Command> {
        let mut cmd = Command::new(self.program()?);
        if request.job.settings.debug {
            cmd.arg("--log-level").arg("debug");
        }
        cmd.arg(RUN_JOB_COMMAND)
            .arg(&request.job.name)
            .arg(wire::encode(request));
        Ok(cmd)
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, request: RunRequest) -> Result<Launched> {
        let mut cmd = self.command(&request)?;

        let (stdout, stderr) = if request.job.settings.debug {
            debug!(job = %request.job.name, "runner output goes to {DEBUG_LOG}");
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(DEBUG_LOG)
                .with_context(|| format!("opening {DEBUG_LOG}"))?;
            let clone = file.try_clone().context("duplicating debug log handle")?;
            (Stdio::from(file), Stdio::from(clone))
        } else {
            (Stdio::null(), Stdio::null())
        };

        let child = cmd
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| {
                CronlockError::Launch(format!("spawning runner for '{}': {e}", request.job.name))
            })?;

        info!(job = %request.job.name, pid = child.id(), "launched runner process");
        Ok(Launched::Process(child))
    }
}
