// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `cronlock`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cronlock",
    version,
    about = "Run cron-scheduled jobs with lock files, dependencies and overrun alarms.",
    long_about = "Run cron-scheduled jobs with lock files, dependencies and overrun alarms.\n\n\
                  Add `* * * * * cronlock tick --config /path/to/Cronlock.toml` to the system \
                  crontab; every invocation is one tick."
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CRONLOCK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Launch every job that is due this minute and return.
    Tick {
        /// Path to the config file (TOML). Defaults to `Cronlock.toml`.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Validate the config and print the jobs it defines.
    List {
        /// Path to the config file (TOML). Defaults to `Cronlock.toml`.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run one job. Started by `tick`; not meant to be typed by hand.
    #[command(hide = true)]
    RunJob {
        /// Job name.
        job: String,
        /// The job's encoded definition.
        encoded: String,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
