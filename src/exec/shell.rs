// src/exec/shell.rs

//! Shell strategy: run a command and wait for it.

use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::ExecutionResult;
use crate::host;
use crate::job::JobSettings;
use crate::joblog::JobLog;

/// Run `command` through the platform shell with stdout and stderr appended
/// to the job log.
pub async fn run_shell(command: &str, settings: &JobSettings, log: &JobLog) -> ExecutionResult {
    match run_shell_inner(command, settings, log).await {
        Ok(result) => result,
        Err(e) => ExecutionResult::failure(format!("{e:#}")),
    }
}

async fn run_shell_inner(
    command: &str,
    settings: &JobSettings,
    log: &JobLog,
) -> anyhow::Result<ExecutionResult> {
    let mut cmd = build_command(command, settings.run_as.as_deref(), host::is_elevated());

    let stdout = log.open_for_child()?;
    let stderr = stdout.try_clone().context("duplicating log handle for stderr")?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    info!(cmd = %command, run_as = ?settings.run_as, "starting shell command");

    let status = cmd
        .status()
        .await
        .with_context(|| format!("running '{command}'"))?;

    debug!(cmd = %command, ?status, "shell command exited");

    if status.success() {
        return Ok(ExecutionResult::success(String::new()));
    }

    Ok(match status.code() {
        Some(code) => ExecutionResult::failure(format!("Job exited with status '{code}'.")),
        None => ExecutionResult::failure("Job was terminated by a signal.".to_string()),
    })
}

/// Build the command line, switching user with `sudo -u` when asked to and
/// allowed to.
pub fn build_command(command: &str, run_as: Option<&str>, elevated: bool) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        return c;
    }

    match run_as {
        Some(user) if elevated => {
            let mut c = Command::new("sudo");
            c.arg("-u").arg(user).arg("sh").arg("-c").arg(command);
            c
        }
        _ => {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        }
    }
}
