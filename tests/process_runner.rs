// tests/process_runner.rs
//
// Launches the real `cronlock` binary as the runner process.

#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use cronlock::config::JobConfig;
use cronlock::launch::ProcessLauncher;
use cronlock::lock::{LockCoordinator, LockId};
use cronlock::runner::RunRequest;
use cronlock::scheduler::Scheduler;
use cronlock_test_utils::builders::JobConfigBuilder;
use cronlock_test_utils::{Sandbox, init_tracing};

const BIN: &str = env!("CARGO_BIN_EXE_cronlock");

fn scheduler() -> Scheduler {
    Scheduler::new(JobConfig::default()).with_program(BIN)
}

fn wait_for(secs: u64, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(secs);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    cond()
}

#[test]
fn shell_job_runs_in_its_own_process() {
    init_tracing();
    let sb = Sandbox::new();
    let mut scheduler = scheduler();
    scheduler
        .add(
            "echo",
            JobConfigBuilder::command("echo \"pid $$\"; echo oops >&2", &sb.lock_dir())
                .output(&sb.log("echo.log"))
                .build(),
        )
        .unwrap();

    let mut report = scheduler.run();
    report.wait_processes().unwrap();

    let log = sb.read_log("echo.log");
    assert!(log.starts_with("pid "), "{log}");
    assert!(!log.contains(&format!("pid {}\n", std::process::id())));
    assert!(log.contains("oops\n"));
    assert!(fs::read_dir(sb.lock_dir()).unwrap().next().is_none());
}

#[test]
fn function_key_crosses_the_process_boundary() {
    init_tracing();
    let sb = Sandbox::new();
    let mut scheduler = scheduler();
    // The stock binary registers no functions.
    scheduler
        .add(
            "report",
            JobConfigBuilder::function("report", &sb.lock_dir())
                .output(&sb.log("report.log"))
                .build(),
        )
        .unwrap();

    let mut report = scheduler.run();
    report.wait_processes().unwrap();

    let log = sb.read_log("report.log");
    assert!(log.contains("ERROR: Function 'report' is not registered"), "{log}");
}

#[test]
fn overrun_is_detected_without_a_duplicate_run() {
    init_tracing();
    let sb = Sandbox::new();
    let mut scheduler = scheduler();
    scheduler
        .add(
            "slow",
            JobConfigBuilder::command("echo started; sleep 4", &sb.lock_dir())
                .output(&sb.log("slow.log"))
                .max_runtime(1)
                .build(),
        )
        .unwrap();
    let locks = LockCoordinator::new(sb.lock_dir());
    let id = LockId::new("slow", None);

    let mut first = scheduler.run();
    assert!(wait_for(5, || locks.is_held(&id).unwrap()));

    // Within the first second: still running, not yet an overrun.
    let mut early = scheduler.run();
    early.wait_processes().unwrap();
    let log = sb.read_log("slow.log");
    assert!(!log.contains("MaxRuntime"), "{log}");

    thread::sleep(Duration::from_millis(1500));
    let mut late = scheduler.run();
    late.wait_processes().unwrap();
    let log = sb.read_log("slow.log");
    assert!(log.contains("ERROR: MaxRuntime of 1 secs exceeded! Current runtime: "), "{log}");

    first.wait_processes().unwrap();
    let log = sb.read_log("slow.log");
    assert_eq!(log.matches("started").count(), 1, "{log}");
    assert!(!locks.is_held(&id).unwrap());
}

#[test]
fn dependencies_keep_order_in_a_shared_log() {
    init_tracing();
    let sb = Sandbox::new();
    let shared = sb.log("shared.log");
    let locks = LockCoordinator::new(sb.lock_dir());

    let mut scheduler = scheduler();
    scheduler
        .add(
            "second",
            JobConfigBuilder::command("echo second; sleep 0.5", &sb.lock_dir())
                .output(&shared)
                .depends_on("first")
                .build(),
        )
        .unwrap();
    scheduler
        .add(
            "third",
            JobConfigBuilder::command("echo third", &sb.lock_dir())
                .output(&shared)
                .depends_on("first,second")
                .build(),
        )
        .unwrap();

    // This test plays `first`: hold its lock while the dependents start.
    let first = locks.acquire(&LockId::new("first", None)).unwrap();
    let mut report = scheduler.run();
    assert!(wait_for(5, || locks.is_held(&LockId::new("second", None)).unwrap()));
    thread::sleep(Duration::from_millis(300));
    assert!(!shared.exists() || sb.read_log("shared.log").is_empty());

    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&shared)
        .unwrap()
        .write_all(b"first\n")
        .unwrap();
    locks.release(first).unwrap();

    report.wait_processes().unwrap();
    assert_eq!(sb.read_log("shared.log"), "first\nsecond\nthird\n");
}

#[test]
fn debug_jobs_ask_the_runner_for_debug_logging() {
    let sb = Sandbox::new();
    let mut cfg = JobConfigBuilder::command("true", &sb.lock_dir()).build();
    cfg.debug = Some(true);

    let mut scheduler = Scheduler::new(JobConfig::default());
    scheduler.add("verbose", cfg).unwrap();
    let job = scheduler.jobs().remove(0);

    let launcher = ProcessLauncher::with_program(BIN);
    let cmd = launcher
        .command(&RunRequest::new(job, chrono::Local::now()))
        .unwrap();
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    assert_eq!(&args[..4], ["--log-level", "debug", "run-job", "verbose"]);
    assert_eq!(args.len(), 5);
}

#[test]
fn cli_tick_and_list() {
    let sb = Sandbox::new();
    let config = sb.path().join("Cronlock.toml");
    fs::write(
        &config,
        format!(
            r#"
[config]
lock_dir = "{locks}"
environment = ""

[job.hello]
schedule = "* * * * *"
command = "echo hello from tick"
output = "{log}"
"#,
            locks = sb.lock_dir().display(),
            log = sb.log("tick.log").display(),
        ),
    )
    .unwrap();

    let list = Command::new(BIN)
        .args(["list", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(list.status.success());
    let stdout = String::from_utf8_lossy(&list.stdout);
    assert!(stdout.contains("hello"), "{stdout}");
    assert!(stdout.contains("* * * * *"), "{stdout}");

    let tick = Command::new(BIN)
        .args(["tick", "--config"])
        .arg(&config)
        .status()
        .unwrap();
    assert!(tick.success());

    // The runner outlives the tick process.
    assert!(wait_for(10, || sb.read_log("tick.log").contains("hello from tick")));
}

#[test]
fn cli_rejects_invalid_config() {
    let sb = Sandbox::new();
    let config = sb.path().join("Cronlock.toml");
    fs::write(&config, "[job.bad]\ncommand = \"true\"\n").unwrap();

    let out = Command::new(BIN)
        .args(["tick", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("'schedule' is required for 'bad' job"), "{stderr}");
}

#[test]
fn cli_reads_cronlock_toml_from_working_directory() {
    let sb = Sandbox::new();
    fs::write(
        sb.path().join("Cronlock.toml"),
        format!(
            "[config]\nlock_dir = \"{}\"\n\n[job.nightly]\nschedule = \"0 3 * * *\"\ncommand = \"true\"\n",
            sb.lock_dir().display(),
        ),
    )
    .unwrap();

    let list = Command::new(BIN)
        .arg("list")
        .current_dir(sb.path())
        .output()
        .unwrap();
    assert!(list.status.success(), "{}", String::from_utf8_lossy(&list.stderr));
    let stdout = String::from_utf8_lossy(&list.stdout);
    assert!(stdout.contains("nightly"), "{stdout}");
    assert!(stdout.contains("0 3 * * *"), "{stdout}");
}
