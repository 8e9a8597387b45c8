// src/config/wire.rs

//! Encoding of a [`RunRequest`] for the `run-job` command line.
//!
//! The job travels as one `application/x-www-form-urlencoded` string of
//! `key=value` pairs. Lists use indexed bracket keys (`depends_on[0]`) and
//! the class invocation nests (`class[args][1]`). Pair order does not
//! matter on decode; unknown keys are ignored. Booleans are `1`/`0`,
//! durations whole seconds, the tick RFC 3339.
//!
//! The job name is not part of the encoding; it is the argument before it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use url::form_urlencoded;

use crate::config::defaults::DEFAULT_SMTP_PORT;
use crate::errors::{CronlockError, Result};
use crate::job::{JobDefinition, JobSettings, SmtpSettings, WorkItem};
use crate::runner::RunRequest;
use crate::schedule::Schedule;

pub fn encode(request: &RunRequest) -> String {
    let job = &request.job;
    let s = &job.settings;
    let mut out = form_urlencoded::Serializer::new(String::new());

    out.append_pair("tick", &request.tick.to_rfc3339());
    out.append_pair("schedule", job.schedule.as_str());

    match &job.work {
        WorkItem::Shell { command } => {
            out.append_pair("command", command);
        }
        WorkItem::Function { key } => {
            out.append_pair("function", key);
        }
        WorkItem::ClassMethod {
            class,
            args,
            method,
            method_args,
        } => {
            out.append_pair("class[name]", class);
            append_list(&mut out, "class[args]", args);
            out.append_pair("class[method]", method);
            append_list(&mut out, "class[method_args]", method_args);
        }
    }

    append_list(&mut out, "recipients", &s.recipients);
    out.append_pair("mailer", &s.mailer.to_string());
    append_secs(&mut out, "max_runtime", s.max_runtime);
    append_opt(&mut out, "smtp_host", s.smtp.host.as_deref());
    out.append_pair("smtp_port", &s.smtp.port.to_string());
    append_opt(&mut out, "smtp_username", s.smtp.username.as_deref());
    append_opt(&mut out, "smtp_password", s.smtp.password.as_deref());
    append_opt(&mut out, "smtp_sender", s.smtp.sender.as_deref());
    append_opt(&mut out, "smtp_sender_name", s.smtp.sender_name.as_deref());
    if let Some(security) = s.smtp.security {
        out.append_pair("smtp_security", &security.to_string());
    }
    append_opt(&mut out, "run_as", s.run_as.as_deref());
    append_opt(&mut out, "environment", s.environment.as_deref());
    append_opt(&mut out, "run_on_host", s.run_on_host.as_deref());
    append_path(&mut out, "output", s.output.as_deref());
    out.append_pair("date_format", &s.date_format);
    out.append_pair("enabled", flag(s.enabled));
    append_path(&mut out, "halt_dir", s.halt_dir.as_deref());
    out.append_pair("debug", flag(s.debug));
    append_list(&mut out, "depends_on", &s.depends_on);
    append_path(&mut out, "lock_dir", Some(&s.lock_dir));
    append_secs(&mut out, "dependency_timeout", s.dependency_timeout);

    out.finish()
}

pub fn decode(name: &str, encoded: &str) -> Result<RunRequest> {
    let mut fields = Fields::parse(encoded);

    let tick = DateTime::parse_from_rfc3339(&fields.required("tick")?)
        .map_err(|e| wire_error(format!("bad tick: {e}")))?
        .with_timezone(&Local);
    let schedule = Schedule::parse(&fields.required("schedule")?)?;
    let work = decode_work(&mut fields)?;

    let settings = JobSettings {
        recipients: fields.list("recipients"),
        mailer: fields.parsed("mailer")?.unwrap_or_default(),
        smtp: SmtpSettings {
            host: fields.take("smtp_host"),
            port: fields.parsed("smtp_port")?.unwrap_or(DEFAULT_SMTP_PORT),
            username: fields.take("smtp_username"),
            password: fields.take("smtp_password"),
            sender: fields.take("smtp_sender"),
            sender_name: fields.take("smtp_sender_name"),
            security: fields.parsed("smtp_security")?,
        },
        max_runtime: fields.parsed("max_runtime")?.map(Duration::from_secs),
        run_as: fields.take("run_as"),
        environment: fields.take("environment"),
        run_on_host: fields.take("run_on_host"),
        output: fields.take("output").map(PathBuf::from),
        date_format: fields.required("date_format")?,
        enabled: fields.flag("enabled")?.unwrap_or(true),
        halt_dir: fields.take("halt_dir").map(PathBuf::from),
        debug: fields.flag("debug")?.unwrap_or(false),
        depends_on: fields.list("depends_on"),
        lock_dir: PathBuf::from(fields.required("lock_dir")?),
        dependency_timeout: fields.parsed("dependency_timeout")?.map(Duration::from_secs),
    };

    Ok(RunRequest {
        job: JobDefinition {
            name: name.to_string(),
            schedule,
            work,
            settings,
        },
        tick,
    })
}

fn decode_work(fields: &mut Fields) -> Result<WorkItem> {
    let command = fields.take("command");
    let function = fields.take("function");
    let class = fields.take("class[name]");

    match (command, function, class) {
        (Some(command), None, None) => Ok(WorkItem::Shell { command }),
        (None, Some(key), None) => Ok(WorkItem::Function { key }),
        (None, None, Some(class)) => Ok(WorkItem::ClassMethod {
            class,
            args: fields.list("class[args]"),
            method: fields.required("class[method]")?,
            method_args: fields.list("class[method_args]"),
        }),
        _ => Err(wire_error(
            "exactly one of 'command', 'function' and 'class[name]' must be present",
        )),
    }
}

type Serializer = form_urlencoded::Serializer<'static, String>;

fn append_opt(out: &mut Serializer, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        out.append_pair(key, value);
    }
}

fn append_path(out: &mut Serializer, key: &str, value: Option<&Path>) {
    if let Some(value) = value {
        out.append_pair(key, &value.to_string_lossy());
    }
}

fn append_secs(out: &mut Serializer, key: &str, value: Option<Duration>) {
    if let Some(value) = value {
        out.append_pair(key, &value.as_secs().to_string());
    }
}

fn append_list(out: &mut Serializer, key: &str, values: &[String]) {
    for (i, value) in values.iter().enumerate() {
        out.append_pair(&format!("{key}[{i}]"), value);
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn wire_error(message: impl Into<String>) -> CronlockError {
    CronlockError::Wire(message.into())
}

/// Decoded pairs, consumed key by key.
struct Fields {
    pairs: HashMap<String, String>,
}

impl Fields {
    fn parse(encoded: &str) -> Self {
        Self {
            pairs: form_urlencoded::parse(encoded.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    fn take(&mut self, key: &str) -> Option<String> {
        self.pairs.remove(key)
    }

    fn required(&mut self, key: &str) -> Result<String> {
        self.take(key)
            .ok_or_else(|| wire_error(format!("missing '{key}'")))
    }

    fn parsed<T>(&mut self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.take(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| wire_error(format!("bad '{key}' value '{raw}': {e}"))),
        }
    }

    fn flag(&mut self, key: &str) -> Result<Option<bool>> {
        match self.take(key).as_deref() {
            None => Ok(None),
            Some("1") => Ok(Some(true)),
            Some("0") => Ok(Some(false)),
            Some(other) => Err(wire_error(format!("bad '{key}' flag '{other}'"))),
        }
    }

    /// Collect `key[0]`, `key[1]`, ... in index order.
    fn list(&mut self, key: &str) -> Vec<String> {
        let prefix = format!("{key}[");
        let mut indexed = BTreeMap::new();
        let keys: Vec<String> = self
            .pairs
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();

        for k in keys {
            let index = k[prefix.len()..]
                .strip_suffix(']')
                .and_then(|i| i.parse::<usize>().ok());
            if let Some(index) = index {
                if let Some(value) = self.pairs.remove(&k) {
                    indexed.insert(index, value);
                }
            }
        }
        indexed.into_values().collect()
    }
}
