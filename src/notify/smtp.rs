//! SMTP delivery via lettre.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use super::{Notifier, RenderedEmail};
use crate::error::NotificationError;

/// SMTP relay settings, built from environment variables.
#[derive(Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl SmtpConfig {
    /// Returns `None` if `SMTP_HOST` is not set (SMTP disabled).
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;

        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default());

        Some(Self {
            host,
            port,
            username,
            password,
        })
    }
}

pub struct SmtpNotifier {
    config: Arc<SmtpConfig>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Build the lettre message for a rendered email.
pub fn build_message(email: &RenderedEmail) -> Result<Message, NotificationError> {
    let from = email
        .from
        .parse()
        .map_err(|e| NotificationError::InvalidAddress {
            address: email.from.clone(),
            reason: format!("{e}"),
        })?;
    let to = email
        .to
        .parse()
        .map_err(|e| NotificationError::InvalidAddress {
            address: email.to.clone(),
            reason: format!("{e}"),
        })?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(email.text_body.clone())
        .map_err(|e| NotificationError::Build(e.to_string()))
}

fn send_blocking(config: &SmtpConfig, message: &Message) -> Result<(), NotificationError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::relay(&config.host)
        .map_err(|e| NotificationError::DeliveryFailed {
            transport: "smtp".into(),
            reason: format!("SMTP relay error: {e}"),
        })?
        .port(config.port)
        .credentials(creds)
        .build();

    transport
        .send(message)
        .map_err(|e| NotificationError::DeliveryFailed {
            transport: "smtp".into(),
            reason: format!("SMTP send failed: {e}"),
        })?;
    Ok(())
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), NotificationError> {
        let message = build_message(email)?;
        let config = Arc::clone(&self.config);

        tokio::task::spawn_blocking(move || send_blocking(&config, &message))
            .await
            .map_err(|e| NotificationError::DeliveryFailed {
                transport: "smtp".into(),
                reason: format!("send task panicked: {e}"),
            })??;
        Ok(())
    }
}
