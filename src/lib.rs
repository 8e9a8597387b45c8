// src/lib.rs

pub mod cli;
pub mod config;
pub mod deps;
pub mod errors;
pub mod exec;
pub mod host;
pub mod job;
pub mod joblog;
pub mod launch;
pub mod lock;
pub mod logging;
pub mod notify;
pub mod process;
pub mod runner;
pub mod schedule;
pub mod scheduler;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{default_config_path, load_and_validate, wire};
use crate::errors::Result;
use crate::exec::TaskRegistry;
use crate::notify::MailNotifier;
use crate::runner::JobRunner;
use crate::scheduler::Scheduler;

pub use crate::config::model::{ClassSpec, ConfigFile, JobConfig, StringList};
pub use crate::exec::{JobClass, TaskError, TaskResult};

/// Parse the command line, set up logging and run.
///
/// A binary that hosts function or class jobs builds its [`TaskRegistry`]
/// and hands it to this function. The same binary is started again for
/// every launched job, so the registry is identical on both sides:
///
/// ```no_run
/// use std::io::Write;
///
/// use cronlock::exec::TaskRegistry;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let registry = TaskRegistry::new().function("hello", |out| {
///         writeln!(out, "hello")?;
///         Ok(())
///     });
///     cronlock::cli_main(registry).await
/// }
/// ```
pub async fn cli_main(registry: TaskRegistry) -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args, registry).await?;
    Ok(())
}

/// High-level entry point used by `main.rs` and [`cli_main`].
pub async fn run(args: CliArgs, registry: TaskRegistry) -> Result<()> {
    let registry = Arc::new(registry);
    debug!(?registry, "task registry");

    match args.command {
        Command::Tick { config } => {
            let config = config.unwrap_or_else(default_config_path);
            tick(&config, registry).await
        }
        Command::List { config } => list(&config.unwrap_or_else(default_config_path)),
        Command::RunJob { job, encoded } => run_job(&job, &encoded, registry).await,
    }
}

async fn tick(config_path: &Path, registry: Arc<TaskRegistry>) -> Result<()> {
    process::ignore_child_signals()?;

    let cfg = load_and_validate(config_path)?;
    let scheduler = Scheduler::from_config(&cfg)?.with_registry(registry, Arc::new(MailNotifier::new()));

    let report = scheduler.run();
    for (job, error) in &report.failed {
        info!(%job, %error, "job not launched this tick");
    }

    // Class jobs run in this process; the tick returned, now let them finish.
    let reports = report.wait_workers().await;
    debug!(workers = reports.len(), "in-process workers finished");
    Ok(())
}

fn list(config_path: &Path) -> Result<()> {
    let cfg = load_and_validate(config_path)?;
    let scheduler = Scheduler::from_config(&cfg)?;

    println!("cronlock jobs ({}):", scheduler.jobs().len());
    for job in scheduler.jobs() {
        println!("  - {}", job.name);
        println!("      schedule: {}", job.schedule);
        println!("      kind: {}", job.work.kind());
        if !job.settings.enabled {
            println!("      enabled: false");
        }
        if !job.settings.depends_on.is_empty() {
            println!("      depends_on: {:?}", job.settings.depends_on);
        }
        if let Some(max) = job.settings.max_runtime {
            println!("      max_runtime: {}s", max.as_secs());
        }
        if let Some(output) = &job.settings.output {
            println!("      output: {}", output.display());
        }
    }
    Ok(())
}

async fn run_job(job: &str, encoded: &str, registry: Arc<TaskRegistry>) -> Result<()> {
    process::restore_child_signals()?;

    let request = wire::decode(job, encoded)?;
    let runner = JobRunner::new(registry, Arc::new(MailNotifier::new()));
    let report = runner.run(&request).await;

    info!(job = %report.job, state = ?report.state, "run finished");
    Ok(())
}
