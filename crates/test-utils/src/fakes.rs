use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use cronlock::errors::{CronlockError, Result};
use cronlock::job::JobSettings;
use cronlock::launch::{Launched, Launcher};
use cronlock::notify::Notifier;
use cronlock::runner::RunRequest;

/// A launcher that records requests instead of starting anything.
///
/// Returns a finished worker handle so callers can treat it like the
/// in-process backend. Needs a tokio runtime unless `failing`.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    launched: Arc<Mutex<Vec<RunRequest>>>,
    failing: bool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose every launch fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn launched(&self) -> Vec<RunRequest> {
        self.launched.lock().unwrap().clone()
    }

    pub fn launched_names(&self) -> Vec<String> {
        self.launched().into_iter().map(|r| r.job.name).collect()
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, request: RunRequest) -> Result<Launched> {
        if self.failing {
            return Err(CronlockError::Launch(format!(
                "refusing to launch '{}'",
                request.job.name
            )));
        }
        self.launched.lock().unwrap().push(request);
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| CronlockError::Launch(e.to_string()))?;
        Ok(Launched::Worker(handle.spawn(async {
            placeholder_report()
        })))
    }
}

fn placeholder_report() -> cronlock::runner::RunReport {
    cronlock::runner::RunReport {
        job: String::new(),
        state: cronlock::runner::RunState::Skipped,
        result: cronlock::exec::ExecutionResult::skipped("fake launcher"),
        lock_acquired: false,
    }
}

/// A notification as seen by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub job: String,
    pub recipients: Vec<String>,
    pub message: String,
}

/// A notifier that remembers what it was asked to send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(
        &'a self,
        job: &'a str,
        settings: &'a JobSettings,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(Notification {
                job: job.to_string(),
                recipients: settings.recipients.clone(),
                message: message.to_string(),
            });
            Ok(())
        })
    }
}
