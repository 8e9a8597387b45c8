// src/process.rs

//! Process-wide initialisation for the two roles the binary plays.
//!
//! The scheduling process ignores `SIGCHLD` so the runner processes it
//! launches (and never waits for) are reaped by the kernel. Ignored signals
//! survive `exec`, so the runner process puts the default disposition back
//! before it starts waiting on shell commands of its own.

use std::sync::Once;

use crate::errors::Result;

static SCHEDULER_INIT: Once = Once::new();

/// Set `SIGCHLD` to `SIG_IGN`. Runs at most once per process.
pub fn ignore_child_signals() -> Result<()> {
    let mut outcome = Ok(());
    SCHEDULER_INIT.call_once(|| {
        outcome = set_child_disposition(true);
    });
    outcome
}

/// Restore the default `SIGCHLD` disposition.
pub fn restore_child_signals() -> Result<()> {
    set_child_disposition(false)
}

#[cfg(unix)]
fn set_child_disposition(ignore: bool) -> Result<()> {
    use anyhow::Context;
    use nix::sys::signal::{signal, SigHandler, Signal};

    let handler = if ignore { SigHandler::SigIgn } else { SigHandler::SigDfl };

    // SAFETY: only SIG_IGN / SIG_DFL are installed; no Rust handler runs.
    unsafe { signal(Signal::SIGCHLD, handler) }
        .map(|_| ())
        .context("changing SIGCHLD disposition")
        .map_err(Into::into)
}

#[cfg(not(unix))]
fn set_child_disposition(_ignore: bool) -> Result<()> {
    Ok(())
}
