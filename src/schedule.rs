// src/schedule.rs

//! Schedule evaluation.
//!
//! A [`Schedule`] is parsed once, when a job is registered, and then asked
//! [`Schedule::is_due`] on every tick. Evaluation has minute resolution and
//! no state: the same schedule and the same minute always give the same
//! answer.
//!
//! Supported forms:
//! - five-field cron (`minute hour day-of-month month day-of-week`) with
//!   `*`, `?`, lists, ranges, steps and `JAN`..`DEC` / `SUN`..`SAT` names;
//! - the `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
//!   `@midnight` and `@hourly` macros;
//! - a one-shot local date-time, `YYYY-MM-DD HH:MM[:SS]`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike};
use regex::Regex;

use crate::errors::{CronlockError, Result};

static ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<any>[*?])|(?P<start>[0-9A-Za-z]+)(?:-(?P<end>[0-9A-Za-z]+))?)(?:/(?P<step>[0-9]+))?$",
    )
    .expect("cron element pattern compiles")
});

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Static description of one cron field.
#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    /// Symbolic names; `names[i]` stands for `min + i`.
    names: &'static [&'static str],
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
};
// 7 is accepted as an alias for Sunday and folded onto 0 after parsing.
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: WEEKDAY_NAMES,
};

/// A parsed schedule. Keeps its source text for display and re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    source: String,
    kind: ScheduleKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScheduleKind {
    Cron(CronFields),
    At(NaiveDateTime),
}

/// Bit sets of the values each field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CronFields {
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl Schedule {
    /// Parse a schedule expression.
    ///
    /// Errors are reported as [`CronlockError::Schedule`] and carry the
    /// offending expression.
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(CronlockError::schedule(expression, "expression is empty"));
        }

        let kind = if let Some(name) = trimmed.strip_prefix('@') {
            let expanded = expand_macro(name).ok_or_else(|| {
                CronlockError::schedule(expression, format!("unknown macro '@{name}'"))
            })?;
            ScheduleKind::Cron(parse_cron(expression, expanded)?)
        } else if let Some(at) = parse_one_shot(trimmed) {
            ScheduleKind::At(at)
        } else {
            ScheduleKind::Cron(parse_cron(expression, trimmed)?)
        };

        Ok(Self {
            source: trimmed.to_string(),
            kind,
        })
    }

    /// The expression this schedule was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the schedule matches `now` at minute resolution.
    pub fn is_due<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        match &self.kind {
            ScheduleKind::Cron(fields) => fields.matches(now),
            ScheduleKind::At(at) => {
                let local = now.naive_local();
                local.date() == at.date()
                    && local.hour() == at.hour()
                    && local.minute() == at.minute()
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = CronlockError;

    fn from_str(s: &str) -> Result<Self> {
        Schedule::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse `expression` and evaluate it against `now` in one go.
pub fn is_due<Tz: TimeZone>(expression: &str, now: &DateTime<Tz>) -> Result<bool> {
    Ok(Schedule::parse(expression)?.is_due(now))
}

impl CronFields {
    fn matches<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        if !has(self.minutes, now.minute())
            || !has(self.hours, now.hour())
            || !has(self.months, now.month())
        {
            return false;
        }

        let dom = has(self.days_of_month, now.day());
        let dow = has(self.days_of_week, now.weekday().num_days_from_sunday());

        // Vixie cron: two restricted day fields are OR-ed.
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

fn has(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn expand_macro(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "yearly" | "annually" => Some("0 0 1 1 *"),
        "monthly" => Some("0 0 1 * *"),
        "weekly" => Some("0 0 * * 0"),
        "daily" | "midnight" => Some("0 0 * * *"),
        "hourly" => Some("0 * * * *"),
        _ => None,
    }
}

fn parse_one_shot(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

fn parse_cron(expression: &str, text: &str) -> Result<CronFields> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(CronlockError::schedule(
            expression,
            format!("expected 5 fields, got {}", parts.len()),
        ));
    }

    let minutes = parse_field(expression, parts[0], MINUTE)?;
    let hours = parse_field(expression, parts[1], HOUR)?;
    let days_of_month = parse_field(expression, parts[2], DAY_OF_MONTH)?;
    let months = parse_field(expression, parts[3], MONTH)?;
    let mut days_of_week = parse_field(expression, parts[4], DAY_OF_WEEK)?;

    if has(days_of_week, 7) {
        days_of_week = (days_of_week | 1) & !(1u64 << 7);
    }

    Ok(CronFields {
        minutes,
        hours,
        days_of_month,
        months,
        days_of_week,
        dom_restricted: is_restricted(parts[2]),
        dow_restricted: is_restricted(parts[4]),
    })
}

fn is_restricted(field: &str) -> bool {
    !(field.starts_with('*') || field.starts_with('?'))
}

fn parse_field(expression: &str, text: &str, spec: FieldSpec) -> Result<u64> {
    let mut mask = 0u64;

    for element in text.split(',') {
        let caps = ELEMENT.captures(element).ok_or_else(|| {
            CronlockError::schedule(
                expression,
                format!("invalid {} element '{}'", spec.name, element),
            )
        })?;

        let step = match caps.name("step") {
            Some(m) => m.as_str().parse::<u32>().ok().filter(|s| *s > 0).ok_or_else(|| {
                CronlockError::schedule(
                    expression,
                    format!("invalid step '{}' in {} field", m.as_str(), spec.name),
                )
            })?,
            None => 1,
        };

        let (low, high) = if caps.name("any").is_some() {
            (spec.min, spec.max)
        } else {
            let start_text = caps.name("start").map(|m| m.as_str()).unwrap_or_default();
            let start = parse_value(expression, start_text, spec)?;
            let end = match caps.name("end") {
                Some(m) => parse_value(expression, m.as_str(), spec)?,
                // `a/s` runs from `a` to the end of the field.
                None if caps.name("step").is_some() => spec.max,
                None => start,
            };
            (start, end)
        };

        if low > high {
            return Err(CronlockError::schedule(
                expression,
                format!("range {low}-{high} is reversed in {} field", spec.name),
            ));
        }

        for value in (low..=high).step_by(step as usize) {
            mask |= 1u64 << value;
        }
    }

    Ok(mask)
}

fn parse_value(expression: &str, text: &str, spec: FieldSpec) -> Result<u32> {
    let value = match text.parse::<u32>() {
        Ok(v) => Some(v),
        Err(_) => {
            let upper = text.to_ascii_uppercase();
            spec.names
                .iter()
                .position(|n| *n == upper)
                .map(|i| spec.min + i as u32)
        }
    };

    match value {
        Some(v) if (spec.min..=spec.max).contains(&v) => Ok(v),
        Some(v) => Err(CronlockError::schedule(
            expression,
            format!(
                "{} value {} out of range {}-{}",
                spec.name, v, spec.min, spec.max
            ),
        )),
        None => Err(CronlockError::schedule(
            expression,
            format!("unrecognised {} value '{}'", spec.name, text),
        )),
    }
}
