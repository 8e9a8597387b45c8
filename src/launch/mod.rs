// src/launch/mod.rs

//! "Launch a concurrent unit of work" with two backends.
//!
//! - [`ProcessLauncher`] starts a new OS process running `run-job` (shell
//!   and function jobs).
//! - [`InProcessLauncher`] spawns a tokio task in the current process
//!   (class jobs).
//!
//! Both end up in [`JobRunner::run`](crate::runner::JobRunner::run); only
//! the place it runs differs. Launching never waits for the run.

mod in_process;
mod process;

use std::process::Child;

use tokio::task::JoinHandle;

use crate::errors::Result;
use crate::runner::{RunReport, RunRequest};

pub use in_process::InProcessLauncher;
pub use process::{ProcessLauncher, RUN_JOB_COMMAND};

/// A launched unit of work.
#[derive(Debug)]
pub enum Launched {
    /// A runner process. Dropping the handle neither waits for nor kills it.
    Process(Child),
    /// A runner task in this process.
    Worker(JoinHandle<RunReport>),
}

pub trait Launcher: Send + Sync {
    fn launch(&self, request: RunRequest) -> Result<Launched>;
}
