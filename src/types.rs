// src/types.rs

//! Small shared enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Transport used to deliver failure notifications.
///
/// - `Sendmail`: pipe the message to the local `sendmail` binary (default).
/// - `Smtp`: talk to `smtp_host:smtp_port` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mailer {
    #[serde(alias = "mail")]
    Sendmail,
    Smtp,
}

impl Default for Mailer {
    fn default() -> Self {
        Mailer::Sendmail
    }
}

impl FromStr for Mailer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            // `mail` used to mean the platform mail() function, which is sendmail underneath.
            "sendmail" | "mail" => Ok(Mailer::Sendmail),
            "smtp" => Ok(Mailer::Smtp),
            other => Err(format!(
                "invalid mailer: {other} (expected \"sendmail\" or \"smtp\")"
            )),
        }
    }
}

impl fmt::Display for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mailer::Sendmail => f.write_str("sendmail"),
            Mailer::Smtp => f.write_str("smtp"),
        }
    }
}

/// Transport security for the SMTP mailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Upgrade a plain connection with STARTTLS.
    #[serde(alias = "starttls")]
    Tls,
    /// Implicit TLS from the first byte (usually port 465).
    Ssl,
}

impl FromStr for SmtpSecurity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tls" | "starttls" => Ok(SmtpSecurity::Tls),
            "ssl" => Ok(SmtpSecurity::Ssl),
            other => Err(format!(
                "invalid smtp_security: {other} (expected \"tls\" or \"ssl\")"
            )),
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpSecurity::Tls => f.write_str("tls"),
            SmtpSecurity::Ssl => f.write_str("ssl"),
        }
    }
}
