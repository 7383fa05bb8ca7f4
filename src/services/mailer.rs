use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError>;

    /// Short label for startup logs.
    fn transport(&self) -> &'static str;
}

/// Writes mail to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            "📧 Outgoing mail\n{}",
            mail.body
        );
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "log"
    }
}

/// Delivers mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let host = config
            .email_host
            .as_deref()
            .ok_or_else(|| AppError::Config("EMAIL_HOST must be set for SMTP delivery".to_string()))?;

        let builder = if config.email_use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else if config.email_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        } else {
            Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
        }
        .map_err(|e| AppError::Config(format!("Invalid SMTP relay {}: {}", host, e)))?;

        let mut builder = builder.port(config.email_port);
        if !config.email_host_user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.email_host_user.clone(),
                config.email_host_password.clone(),
            ));
        }

        let from = config
            .email_host_user
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid EMAIL_HOST_USER sender: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), AppError> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| AppError::Internal(format!("Failed to build mail: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Upstream(format!("SMTP delivery failed: {}", e)))?;

        tracing::debug!("📧 Mail delivered to {}", mail.to);
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "smtp"
    }
}

/// SMTP when `EMAIL_HOST` is configured, the log mailer otherwise.
pub fn mailer_from_config(config: &Config) -> Result<Arc<dyn Mailer>, AppError> {
    match config.email_host {
        Some(_) => Ok(Arc::new(SmtpMailer::new(config)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

pub fn verification_mail(config: &Config, to: &str, first_name: &str, token: &str) -> OutgoingMail {
    let link = format!("{}/{}", config.verification_url.trim_end_matches('/'), token);
    OutgoingMail {
        to: to.to_string(),
        subject: "Verify your Matcha account".to_string(),
        body: format!(
            "Hi {},\n\nWelcome to Matcha! Confirm your email address by opening the link below:\n\n{}\n\nThis link expires in 24 hours.",
            first_name, link
        ),
    }
}

pub fn password_reset_mail(config: &Config, to: &str, first_name: &str, token: &str) -> OutgoingMail {
    let link = format!("{}?token={}", config.password_reset_url, token);
    OutgoingMail {
        to: to.to_string(),
        subject: "Reset your Matcha password".to_string(),
        body: format!(
            "Hi {},\n\nSomeone asked to reset your password. Use the link below to pick a new one:\n\n{}\n\nThe link expires in 1 hour. Ignore this email if it wasn't you.",
            first_name, link
        ),
    }
}
