//! Outbound email seam.
//!
//! The server only ever sends the account-activation mail. `Mailer` keeps the
//! transport swappable; the default implementation logs the message instead of
//! speaking SMTP.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailError(pub String);

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MailError {}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Logs the message at `info` level and reports success.
#[derive(Debug, Default)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "outbound email"
        );
        Ok(())
    }
}

/// Test double that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        self.sent.lock().await.push(message);
        Ok(())
    }
}

#[must_use]
pub fn activation_email(
    from: &str,
    to: &str,
    first_name: &str,
    activation_url: &str,
) -> EmailMessage {
    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Activate Your Account".to_string(),
        html: format!(
            "<h1>Hello {first_name}</h1>\
             <p>Please activate your account by clicking the following link: \
             <a href=\"{activation_url}\">Click Here</a></p>\
             <p>Link will expire in 5 minutes</p>"
        ),
    }
}
