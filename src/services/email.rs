//! Outbound email.
//!
//! The core builds [`EmailMessage`]s and hands them to an [`EmailSender`]. OTP
//! and reset mails propagate send failures; notifications swallow them.

use crate::config::settings::SmtpSettings;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

/// A single outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Send as `text/html` instead of `text/plain`
    pub is_html: bool,
}

/// Delivers email messages.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends one message. Failures surface as [`Error::ExternalService`].
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// SMTP delivery over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds a mailer for the configured relay.
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| Error::Config {
                message: format!("EMAIL_FROM is not a valid mailbox: {e}"),
            })?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| Error::Config {
                message: format!("Invalid SMTP relay {}: {e}", settings.host),
            })?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| Error::external("email", e))?;
        let content_type = if message.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(content_type)
            .body(message.body)
            .map_err(|e| Error::external("email", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| Error::external("email", e))?;
        debug!("Email sent");
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured. Every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl EmailSender for DisabledMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        Err(Error::external(
            "email",
            format!("SMTP is not configured; dropping mail to {}", message.to),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_mailer_fails_as_external_service() {
        let result = DisabledMailer
            .send(EmailMessage {
                to: "a@x.com".to_string(),
                subject: "Hi".to_string(),
                body: "Body".to_string(),
                is_html: false,
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::ExternalService { service, .. }) if service == "email"
        ));
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_sender() {
        let settings = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "user".to_string(),
            password: "pass".to_string(),
            from: "not a mailbox".to_string(),
        };
        assert!(matches!(
            SmtpMailer::new(&settings),
            Err(Error::Config { .. })
        ));
    }
}
