// src/joblog.rs

//! The job's log sink.
//!
//! This is the operator-facing output of a job: the work item's own output
//! plus `ERROR:` / `INFO:` status lines. It is separate from the `tracing`
//! diagnostics set up in `logging.rs`. A job without `output` has no sink
//! and everything written to it is discarded.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use tracing::warn;

use crate::config::defaults::DEFAULT_DATE_FORMAT;
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct JobLog {
    path: Option<PathBuf>,
    date_format: String,
}

impl JobLog {
    pub fn new(path: Option<PathBuf>, date_format: impl Into<String>) -> Self {
        Self {
            path,
            date_format: date_format.into(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `[timestamp] message\n`.
    ///
    /// An unparseable `date_format` falls back to the default format.
    pub fn line(&self, message: &str) {
        let valid = !StrftimeItems::new(&self.date_format).any(|i| matches!(i, Item::Error));
        let format = if valid { self.date_format.as_str() } else { DEFAULT_DATE_FORMAT };
        let now = Local::now().format(format);
        self.append(format!("[{now}] {message}\n").as_bytes());
    }

    /// Append raw bytes. Write failures are reported via `tracing` only:
    /// a broken sink must not turn into a job failure.
    pub fn append(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_to(path, bytes) {
            warn!(path = %path.display(), error = %e, "failed to write job log");
        }
    }

    /// Open the sink for a child process to append to; the null device
    /// when there is no sink.
    pub fn open_for_child(&self) -> Result<File> {
        match &self.path {
            Some(path) => Ok(open_append(path)?),
            None => Ok(OpenOptions::new()
                .write(true)
                .open(crate::host::null_device())
                .context("opening null device")?),
        }
    }

    /// Delete the sink if it exists and is empty.
    pub fn remove_if_empty(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() == 0 => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn open_append(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

fn append_to(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let mut file = open_append(path)?;
    file.write_all(bytes)
        .with_context(|| format!("appending to log file {}", path.display()))?;
    Ok(())
}
