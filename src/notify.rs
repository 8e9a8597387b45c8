// src/notify.rs

//! Failure notifications.
//!
//! The runner talks to a [`Notifier`] rather than to a mail transport
//! directly, so tests can record notifications instead of sending them.
//! [`MailNotifier`] is the production implementation and delivers through
//! `lettre`, either via the local `sendmail` binary or over SMTP.

use std::future::Future;
use std::pin::Pin;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{
    AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::errors::{CronlockError, Result};
use crate::host;
use crate::job::JobSettings;
use crate::types::{Mailer, SmtpSecurity};

/// Something that can tell a human a job needs attention.
pub trait Notifier: Send + Sync {
    /// Deliver `message` about `job` to `settings.recipients`.
    fn notify<'a>(
        &'a self,
        job: &'a str,
        settings: &'a JobSettings,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Mail notifier used in production.
#[derive(Debug, Clone)]
pub struct MailNotifier {
    host: String,
}

impl MailNotifier {
    pub fn new() -> Self {
        Self {
            host: host::hostname(),
        }
    }

    /// Subject line for a job's notification.
    pub fn subject(&self, job: &str) -> String {
        format!("[{}] '{}' needs some attention!", self.host, job)
    }

    /// Build the message without sending it.
    pub fn build_message(&self, job: &str, settings: &JobSettings, message: &str) -> Result<Message> {
        let sender = settings
            .smtp
            .sender
            .clone()
            .unwrap_or_else(|| format!("cronlock@{}", self.host));
        let from = Mailbox::new(
            settings.smtp.sender_name.clone(),
            sender
                .parse()
                .map_err(|e| CronlockError::Notify(format!("invalid sender '{sender}': {e}")))?,
        );

        let mut builder = Message::builder()
            .from(from)
            .subject(self.subject(job))
            .header(ContentType::TEXT_PLAIN);

        for recipient in &settings.recipients {
            let mailbox: Mailbox = recipient.parse().map_err(|e| {
                CronlockError::Notify(format!("invalid recipient '{recipient}': {e}"))
            })?;
            builder = builder.to(mailbox);
        }

        builder
            .body(message.to_string())
            .map_err(|e| CronlockError::Notify(e.to_string()))
    }

    async fn send(&self, job: &str, settings: &JobSettings, message: &str) -> Result<()> {
        if settings.recipients.is_empty() {
            debug!(job, "no recipients configured; not sending mail");
            return Ok(());
        }

        let email = self.build_message(job, settings, message)?;

        match settings.mailer {
            Mailer::Sendmail => {
                AsyncSendmailTransport::<Tokio1Executor>::new()
                    .send(email)
                    .await
                    .map_err(|e| CronlockError::Notify(format!("sendmail: {e}")))?;
            }
            Mailer::Smtp => {
                let transport = smtp_transport(settings)?;
                transport
                    .send(email)
                    .await
                    .map_err(|e| CronlockError::Notify(format!("smtp: {e}")))?;
            }
        }

        info!(job, mailer = %settings.mailer, recipients = settings.recipients.len(), "notification sent");
        Ok(())
    }
}

impl Default for MailNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for MailNotifier {
    fn notify<'a>(
        &'a self,
        job: &'a str,
        settings: &'a JobSettings,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.send(job, settings, message))
    }
}

fn smtp_transport(settings: &JobSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let smtp = &settings.smtp;
    let host = smtp
        .host
        .as_deref()
        .ok_or_else(|| CronlockError::Notify("smtp mailer needs smtp_host".to_string()))?;

    let mut builder = match smtp.security {
        Some(SmtpSecurity::Ssl) => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| CronlockError::Notify(e.to_string()))?,
        Some(SmtpSecurity::Tls) => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| CronlockError::Notify(e.to_string()))?,
        None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
    }
    .port(smtp.port);

    if let Some(username) = &smtp.username {
        builder = builder.credentials(Credentials::new(
            username.clone(),
            smtp.password.clone().unwrap_or_default(),
        ));
    }

    Ok(builder.build())
}
