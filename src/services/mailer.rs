//! Outbound mail. Delivery failures are logged and never surfaced to callers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    #[must_use]
    pub fn password_reset(to: &str, site_url: &str, token: &str) -> Self {
        let link = format!("{}/reset-password?token={token}", site_url.trim_end_matches('/'));
        Self {
            to: to.to_string(),
            subject: "Password reset".to_string(),
            body: format!(
                "A password reset was requested for your account.\n\n\
                 Open this link within one hour to choose a new password:\n{link}\n\n\
                 If you did not request this, ignore this message."
            ),
        }
    }

    #[must_use]
    pub fn password_rotated(to: &str, new_password: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your password was changed".to_string(),
            body: format!(
                "Suspicious sign-in attempts were detected on your account, so its \
                 password was replaced.\n\nTemporary password: {new_password}\n\n\
                 Sign in and change it as soon as possible."
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        info!(to = %message.to, subject = %message.subject, "mail delivery disabled, message logged");
        Ok(())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = config
            .from_address
            .parse()
            .with_context(|| format!("Invalid sender address: {}", config.from_address))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .with_context(|| format!("Invalid SMTP relay: {}", config.smtp_host))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let to: Mailbox = message
            .to
            .parse()
            .with_context(|| format!("Invalid recipient address: {}", message.to))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("Failed to build email")?;

        self.transport
            .send(email)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Sends `message`, logging instead of returning any failure.
pub async fn deliver(mailer: &dyn Mailer, message: MailMessage) {
    if let Err(e) = mailer.send(&message).await {
        warn!(to = %message.to, subject = %message.subject, error = %e, "Failed to send mail");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _message: &MailMessage) -> Result<()> {
            anyhow::bail!("relay unreachable")
        }
    }

    #[test]
    fn reset_link_uses_site_url() {
        let message = MailMessage::password_reset("a@example.com", "https://anime.test/", "tok");
        assert!(message.body.contains("https://anime.test/reset-password?token=tok"));
        assert_eq!(message.to, "a@example.com");
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        deliver(&FailingMailer, MailMessage::password_rotated("a@example.com", "pw")).await;
        deliver(&LogMailer, MailMessage::password_rotated("a@example.com", "pw")).await;
    }

    #[test]
    fn smtp_mailer_rejects_bad_sender() {
        let config = MailConfig {
            from_address: "not an address".to_string(),
            ..MailConfig::default()
        };
        assert!(SmtpMailer::new(&config).is_err());
    }
}
