// src/config/defaults.rs

//! The default table every configuration bag is layered over.

use crate::config::model::JobConfig;
use crate::host;
use crate::types::Mailer;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_SMTP_PORT: u16 = 25;
pub const DEFAULT_SENDER_NAME: &str = "cronlock";
pub const DEFAULT_CLASS_METHOD: &str = "index";

impl JobConfig {
    /// Process-wide defaults.
    ///
    /// Host-dependent entries (`run_on_host`, `smtp_sender`) and
    /// `environment` (from `APPLICATION_ENV`) are computed on each call.
    pub fn defaults() -> JobConfig {
        let host = host::hostname();

        JobConfig {
            mailer: Some(Mailer::Sendmail),
            smtp_port: Some(DEFAULT_SMTP_PORT),
            smtp_sender: Some(format!("cronlock@{host}")),
            smtp_sender_name: Some(DEFAULT_SENDER_NAME.to_string()),
            environment: host::application_env(),
            run_on_host: Some(host),
            date_format: Some(DEFAULT_DATE_FORMAT.to_string()),
            enabled: Some(true),
            debug: Some(false),
            lock_dir: Some(std::env::temp_dir()),
            ..JobConfig::default()
        }
    }
}
