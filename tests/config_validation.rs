// tests/config_validation.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use cronlock::config::{ClassSpec, JobConfig, StringList, load_and_validate, validate_job};
use cronlock::errors::CronlockError;
use cronlock::job::{JobSettings, WorkItem};
use cronlock::scheduler::Scheduler;
use cronlock::types::{Mailer, SmtpSecurity};
use cronlock_test_utils::builders::{ConfigFileBuilder, JobConfigBuilder};
use tempfile::NamedTempFile;

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_file_loads() {
    let file = toml_file(
        r#"
[config]
recipients = "ops@example.com, dev@example.com"
mailer = "smtp"
smtp_host = "mail.example.com"
smtp_security = "starttls"
environment = "prod"
something_unknown = 42

[job.backup]
schedule = "0 3 * * *"
command = "tar czf /srv/backup.tgz /srv/data"
max_runtime = 3600

[job.report]
schedule = "@hourly"
class = { name = "Report", args = ["daily"], method = "send", method_args = "weekly" }
depends_on = ["backup"]

[job.cleanup]
schedule = "*/15 * * * *"
function = "cleanup"
enabled = false
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.job.len(), 3);
    assert_eq!(cfg.config.mailer, Some(Mailer::Smtp));
    assert_eq!(cfg.config.smtp_security, Some(SmtpSecurity::Tls));

    let scheduler = Scheduler::from_config(&cfg).unwrap();
    let jobs = scheduler.jobs();
    let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["backup", "cleanup", "report"]);

    let report = &jobs[2];
    assert_eq!(
        report.work,
        WorkItem::ClassMethod {
            class: "Report".into(),
            args: vec!["daily".into()],
            method: "send".into(),
            method_args: vec!["weekly".into()],
        }
    );
    assert_eq!(report.settings.depends_on, vec!["backup".to_string()]);
    assert_eq!(
        report.settings.recipients,
        vec!["ops@example.com".to_string(), "dev@example.com".to_string()]
    );
    assert_eq!(report.settings.environment.as_deref(), Some("prod"));

    assert_eq!(jobs[0].settings.max_runtime, Some(Duration::from_secs(3600)));
    assert!(!jobs[1].settings.enabled);
}

#[test]
fn bare_class_name_defaults_to_index() {
    let cfg = JobConfig {
        schedule: Some("* * * * *".into()),
        class: Some(ClassSpec::Name("Report".into())),
        ..JobConfig::default()
    };
    let (_, work) = validate_job("report", &cfg).unwrap();
    assert_eq!(
        work,
        WorkItem::ClassMethod {
            class: "Report".into(),
            args: vec![],
            method: "index".into(),
            method_args: vec![],
        }
    );
}

#[test]
fn missing_schedule_is_a_config_error() {
    let cfg = JobConfig {
        command: Some("true".into()),
        ..JobConfig::default()
    };
    match validate_job("nightly", &cfg) {
        Err(CronlockError::ConfigError(msg)) => {
            assert_eq!(msg, "'schedule' is required for 'nightly' job");
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn work_item_must_be_exactly_one() {
    let none = JobConfig {
        schedule: Some("* * * * *".into()),
        ..JobConfig::default()
    };
    let two = JobConfig {
        schedule: Some("* * * * *".into()),
        command: Some("true".into()),
        function: Some("f".into()),
        ..JobConfig::default()
    };

    for cfg in [none, two] {
        match validate_job("nightly", &cfg) {
            Err(CronlockError::ConfigError(msg)) => assert_eq!(
                msg,
                "Either 'command' or 'function' or 'class' is required for 'nightly' job"
            ),
            Err(e) => panic!("Expected ConfigError, got: {:?}", e),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }
}

#[test]
fn malformed_schedule_fails_at_registration() {
    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = Scheduler::new(JobConfig::default());
    let cfg = JobConfigBuilder::command("true", dir.path())
        .schedule("61 * * * *")
        .build();

    match scheduler.add("bad", cfg) {
        Err(CronlockError::Schedule { expression, .. }) => assert_eq!(expression, "61 * * * *"),
        Err(e) => panic!("Expected Schedule error, got: {:?}", e),
        Ok(()) => panic!("Expected error, got Ok"),
    }
    assert!(scheduler.jobs().is_empty());
}

#[test]
fn self_dependency_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = Scheduler::new(JobConfig::default());
    let cfg = JobConfigBuilder::command("true", dir.path())
        .depends_on("a")
        .build();

    match scheduler.add("a", cfg) {
        Err(CronlockError::ConfigError(msg)) => assert!(msg.contains("itself")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(()) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn dependency_cycle_is_rejected() {
    let file = toml_file(
        r#"
[job.a]
schedule = "* * * * *"
command = "echo a"
depends_on = "b"

[job.b]
schedule = "* * * * *"
command = "echo b"
depends_on = "a"
"#,
    );

    match load_and_validate(file.path()) {
        Err(CronlockError::ConfigError(msg)) => {
            assert!(msg.contains("cycle"));
            assert!(msg.contains('a') || msg.contains('b'));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_dependency_is_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ConfigFileBuilder::new()
        .with_job(
            "report",
            JobConfigBuilder::command("true", dir.path())
                .depends_on("runs_elsewhere")
                .build(),
        )
        .build();
    assert_eq!(cfg.job.len(), 1);
}

#[test]
fn empty_config_is_rejected() {
    let file = toml_file("[config]\nrecipients = \"ops@example.com\"\n");
    match load_and_validate(file.path()) {
        Err(CronlockError::ConfigError(msg)) => assert!(msg.contains("[job.<name>]")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn invalid_toml_is_a_toml_error() {
    let file = toml_file("[job.a\nschedule = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(CronlockError::TomlError(_))
    ));
}

#[test]
fn defaults_apply_and_job_config_wins() {
    let mut scheduler = Scheduler::new(JobConfig {
        recipients: Some(StringList::from("ops@example.com")),
        max_runtime: Some(60),
        date_format: Some("%H:%M".into()),
        ..JobConfig::default()
    });

    scheduler
        .add(
            "a",
            JobConfig {
                schedule: Some("* * * * *".into()),
                command: Some("true".into()),
                max_runtime: Some(5),
                ..JobConfig::default()
            },
        )
        .unwrap();

    let job = &scheduler.jobs()[0];
    let s: &JobSettings = &job.settings;
    assert_eq!(s.max_runtime, Some(Duration::from_secs(5)));
    assert_eq!(s.recipients, vec!["ops@example.com".to_string()]);
    assert_eq!(s.date_format, "%H:%M");
    assert_eq!(s.mailer, Mailer::Sendmail);
    assert_eq!(s.smtp.port, 25);
    assert!(s.enabled);
    assert!(!s.debug);
    assert_eq!(s.lock_dir, std::env::temp_dir());
    assert_eq!(s.run_on_host.as_deref(), Some(cronlock::host::hostname().as_str()));
    assert_eq!(s.smtp.sender_name.as_deref(), Some("cronlock"));
}

#[test]
fn set_config_applies_to_registered_jobs() {
    let mut scheduler = Scheduler::new(JobConfig::default());
    scheduler
        .add(
            "a",
            JobConfig {
                schedule: Some("* * * * *".into()),
                command: Some("true".into()),
                ..JobConfig::default()
            },
        )
        .unwrap();

    scheduler.set_config(JobConfig {
        output: Some(PathBuf::from("/tmp/all.log")),
        ..JobConfig::default()
    });
    assert_eq!(
        scheduler.jobs()[0].settings.output,
        Some(PathBuf::from("/tmp/all.log"))
    );
    assert_eq!(scheduler.config().output, Some(PathBuf::from("/tmp/all.log")));
}

#[test]
fn adding_a_job_twice_replaces_it() {
    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = Scheduler::new(JobConfig::default());
    scheduler
        .add("a", JobConfigBuilder::command("echo one", dir.path()).build())
        .unwrap();
    scheduler
        .add("a", JobConfigBuilder::command("echo two", dir.path()).build())
        .unwrap();

    let jobs = scheduler.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].work, WorkItem::Shell { command: "echo two".into() });
}
