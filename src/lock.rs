// src/lock.rs

//! Advisory lock files, one per (job, environment).
//!
//! Ownership of a lock is an exclusive `flock(2)` on the lock file, held for
//! as long as the [`Lock`] lives. The kernel drops it when the owner exits,
//! however it exits, so a file left behind by a crashed run is simply
//! unlocked and the next acquirer takes it over. The file holds the owner's
//! PID for operators; nothing reads it back.
//!
//! The file's modification time is the start of the run, which is what
//! overrun detection measures.
//!
//! The owner unlinks the file before unlocking it. An acquirer that opened
//! the old file just before the unlink can still win the `flock`, so every
//! acquirer checks that the file it locked is still the one at the path and
//! starts over otherwise.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use tracing::{debug, warn};

use crate::errors::{CronlockError, Result};

/// Identity of a lock: job name plus optional environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockId {
    pub job: String,
    pub environment: Option<String>,
}

impl LockId {
    pub fn new(job: &str, environment: Option<&str>) -> Self {
        Self {
            job: job.to_string(),
            environment: environment.filter(|e| !e.is_empty()).map(str::to_string),
        }
    }

    /// File name of the lock: `{env}-{job}.lck` or `{job}.lck`.
    ///
    /// Both parts are escaped so `-` only ever appears as the separator.
    pub fn file_name(&self) -> String {
        match &self.environment {
            Some(env) => format!("{}-{}.lck", escape(env), escape(&self.job)),
            None => format!("{}.lck", escape(&self.job)),
        }
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.environment {
            Some(env) => write!(f, "{}/{}", env, self.job),
            None => f.write_str(&self.job),
        }
    }
}

/// Keep `[A-Za-z0-9_.]`, percent-encode every other byte.
fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Creates, inspects and removes lock files under one directory.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    dir: PathBuf,
}

impl LockCoordinator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, id: &LockId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    /// Take the lock for `id` or fail with [`CronlockError::LockHeld`].
    ///
    /// Another process probing the lock with [`age`](Self::age) holds it
    /// shared for an instant, so a refused attempt is retried a few times
    /// before giving up.
    pub fn acquire(&self, id: &LockId) -> Result<Lock> {
        let path = self.path_of(id);

        for attempt in 0..ACQUIRE_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(ACQUIRE_RETRY_DELAY);
            }

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .with_context(|| format!("opening lock file {}", path.display()))?;

            let Some(guard) = try_lock(file, LockMode::Exclusive)
                .with_context(|| format!("locking {}", path.display()))?
            else {
                continue;
            };

            if !is_current(&guard, &path)? {
                debug!(lock = %id, "lock file was replaced while locking; retrying");
                continue;
            }

            write_owner(&guard)
                .with_context(|| format!("writing owner to {}", path.display()))?;

            debug!(lock = %id, path = %path.display(), "lock acquired");
            return Ok(Lock {
                id: id.clone(),
                path,
                guard: Some(guard),
            });
        }

        Err(CronlockError::LockHeld { path })
    }

    /// Release a lock. Same as [`Lock::release`].
    pub fn release(&self, mut lock: Lock) -> Result<()> {
        lock.release()
    }

    /// Age of the lock for `id` if it is currently held.
    ///
    /// `None` when there is no file or nobody holds it. Never takes
    /// ownership.
    pub fn age(&self, id: &LockId) -> Result<Option<Duration>> {
        let path = self.path_of(id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("opening lock file {}", path.display()))
                    .into());
            }
        };

        let probe = try_lock(file, LockMode::Shared)
            .with_context(|| format!("probing {}", path.display()))?;
        if probe.is_some() {
            return Ok(None);
        }

        let modified = match fs::metadata(&path) {
            Ok(meta) => meta
                .modified()
                .with_context(|| format!("reading mtime of {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(Some(age))
    }

    /// Whether `id` is currently held.
    pub fn is_held(&self, id: &LockId) -> Result<bool> {
        Ok(self.age(id)?.is_some())
    }
}

const ACQUIRE_ATTEMPTS: u32 = 5;
const ACQUIRE_RETRY_DELAY: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

#[cfg(unix)]
type Guard = nix::fcntl::Flock<File>;

#[cfg(not(unix))]
type Guard = File;

/// Non-blocking lock attempt. `None` when someone else holds the file.
#[cfg(unix)]
fn try_lock(file: File, mode: LockMode) -> io::Result<Option<Guard>> {
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};

    let arg = match mode {
        LockMode::Shared => FlockArg::LockSharedNonblock,
        LockMode::Exclusive => FlockArg::LockExclusiveNonblock,
    };
    match Flock::lock(file, arg) {
        Ok(guard) => Ok(Some(guard)),
        Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
        Err((_, errno)) => Err(errno.into()),
    }
}

#[cfg(not(unix))]
fn try_lock(file: File, mode: LockMode) -> io::Result<Option<Guard>> {
    use std::fs::TryLockError;

    let attempt = match mode {
        LockMode::Shared => file.try_lock_shared(),
        LockMode::Exclusive => file.try_lock(),
    };
    match attempt {
        Ok(()) => Ok(Some(file)),
        Err(TryLockError::WouldBlock) => Ok(None),
        Err(TryLockError::Error(e)) => Err(e),
    }
}

/// Whether `path` still names the file behind `file`.
#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn is_current(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

fn write_owner(file: &File) -> io::Result<()> {
    let mut file = file;
    file.set_len(0)?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

/// An acquired lock. Released explicitly or on drop.
pub struct Lock {
    id: LockId,
    path: PathBuf,
    guard: Option<Guard>,
}

impl Lock {
    pub fn id(&self) -> &LockId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file and unlock it. Idempotent. A file at the path
    /// that is not ours (ours was removed behind our back and someone else
    /// took the lock since) is left alone.
    pub fn release(&mut self) -> Result<()> {
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };

        let ours = is_current(&guard, &self.path)?;

        // Windows refuses to delete a file that is still open.
        #[cfg(not(unix))]
        drop(guard);

        if !ours {
            debug!(lock = %self.id, "lock file no longer ours on release");
            return Ok(());
        }

        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(lock = %self.id, "lock released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(lock = %self.id, "lock file already gone on release");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("held", &self.guard.is_some())
            .finish()
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(lock = %self.id, error = %e, "failed to release lock on drop");
        }
    }
}
