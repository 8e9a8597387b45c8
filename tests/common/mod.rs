#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Local;
use cronlock::config::{JobConfig, validate_job};
use cronlock::exec::{JobClass, TaskError, TaskRegistry, TaskResult};
use cronlock::job::{JobDefinition, JobSettings};
use cronlock::runner::{JobRunner, RunReport, RunRequest};
use cronlock_test_utils::fakes::RecordingNotifier;

/// Registry shared by the runner tests.
pub fn registry() -> TaskRegistry {
    TaskRegistry::new()
        .function("hello", |out| {
            writeln!(out, "hello from function")?;
            Ok(())
        })
        .function("silent", |_out| Ok(()))
        .function("fails", |out| {
            writeln!(out, "partial")?;
            Err(TaskError::Failed("false".into()))
        })
        .function("panics", |out| {
            writeln!(out, "before panic")?;
            panic!("boom");
        })
        .function("info", |_out| Err(TaskError::Info("nothing to do".into())))
        .class("Greeter", |args| {
            Ok(Box::new(Greeter {
                name: args.first().cloned().unwrap_or_else(|| "world".into()),
            }) as Box<dyn JobClass>)
        })
        .class("Broken", |_args| Err(anyhow!("cannot construct")))
}

struct Greeter {
    name: String,
}

impl JobClass for Greeter {
    fn has_method(&self, method: &str) -> bool {
        matches!(method, "index" | "greet" | "fail")
    }

    fn call(&mut self, method: &str, args: &[String], out: &mut dyn Write) -> TaskResult {
        match method {
            "index" => writeln!(out, "Hello, {}!", self.name)?,
            "greet" => {
                let greeting = args.first().map(String::as_str).unwrap_or("Hi");
                writeln!(out, "{greeting}, {}!", self.name)?;
            }
            _ => return Err(TaskError::Failed("greeter failed".into())),
        }
        Ok(())
    }
}

/// Resolve `cfg` the way the scheduler does.
pub fn definition(name: &str, cfg: JobConfig) -> JobDefinition {
    let (schedule, work) = validate_job(name, &cfg).expect("valid job config");
    JobDefinition {
        name: name.to_string(),
        schedule,
        work,
        settings: JobSettings::resolve(&JobConfig::defaults().merge(&cfg)),
    }
}

pub fn runner(notifier: &RecordingNotifier) -> JobRunner {
    JobRunner::new(Arc::new(registry()), Arc::new(notifier.clone()))
        .with_poll_interval(Duration::from_millis(20))
}

pub async fn run_now(runner: &JobRunner, job: JobDefinition) -> RunReport {
    runner.run(&RunRequest::new(job, Local::now())).await
}
