//! Delivery through a transactional-email HTTP API.
//!
//! Posts `{from, to, subject, text}` as JSON with a bearer key, the request
//! shape accepted by Resend-style providers.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::{Notifier, RenderedEmail};
use crate::error::NotificationError;

#[derive(Debug)]
pub struct HttpMailConfig {
    pub endpoint: String,
    pub api_key: SecretString,
}

impl HttpMailConfig {
    /// Returns `None` unless both `EMAIL_API_URL` and `EMAIL_API_KEY` are set.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("EMAIL_API_URL").ok()?;
        let api_key = std::env::var("EMAIL_API_KEY").ok()?;
        Some(Self {
            endpoint,
            api_key: SecretString::from(api_key),
        })
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

pub struct HttpNotifier {
    client: reqwest::Client,
    config: HttpMailConfig,
}

impl HttpNotifier {
    pub fn new(config: HttpMailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), NotificationError> {
        let body = SendRequest {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            text: &email.text_body,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed {
                transport: "http".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotificationError::DeliveryFailed {
                transport: "http".into(),
                reason: format!("{status}: {detail}"),
            });
        }
        Ok(())
    }
}
