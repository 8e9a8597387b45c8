// src/deps.rs

//! Waiting for dependency locks to clear.
//!
//! A job with `depends_on = ["a", "b"]` proceeds to its work only once the
//! locks of `a` and `b` are observed absent in the same check. This is a
//! polling protocol, not a barrier: a dependency that re-acquires its lock
//! right after the check is not noticed.
//!
//! Without a timeout the wait is unbounded. A dependency that never runs
//! never holds its lock, so it does not block; a dependency that is stuck
//! running blocks its dependents for as long as it is stuck.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::errors::{CronlockError, Result};
use crate::lock::{LockCoordinator, LockId};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct DependencyWaiter {
    locks: LockCoordinator,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl DependencyWaiter {
    pub fn new(locks: LockCoordinator) -> Self {
        Self {
            locks,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Block until none of `ids` is held.
    pub async fn wait_all(&self, ids: &[LockId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let mut announced = false;

        loop {
            let pending = self.held(ids)?;
            if pending.is_empty() {
                if announced {
                    info!(waited_ms = started.elapsed().as_millis() as u64, "dependencies released");
                }
                return Ok(());
            }

            if !announced {
                info!(pending = ?pending, "waiting for dependencies");
                announced = true;
            } else {
                debug!(pending = ?pending, "dependencies still held");
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    return Err(CronlockError::DependencyTimeout {
                        waited: started.elapsed().as_secs(),
                        pending,
                    });
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    fn held(&self, ids: &[LockId]) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        for id in ids {
            if self.locks.is_held(id)? {
                pending.push(id.job.clone());
            }
        }
        Ok(pending)
    }
}
