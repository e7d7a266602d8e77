//! Outbound notifications: intents, templates, and delivery transports.
//!
//! Delivery is best-effort from the caller's point of view: a failed send is
//! logged and reported alongside the committed mutation, never rolled back.

pub mod http;
pub mod intent;
pub mod smtp;
pub mod templates;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::NotificationError;

pub use http::{HttpMailConfig, HttpNotifier};
pub use intent::{
    NotificationIntent, TemplateKind, intent_for_created, intent_for_review,
    intent_for_status_change,
};
pub use smtp::{SmtpConfig, SmtpNotifier};
pub use templates::{MailSettings, RenderedEmail, render};

/// A transport that can deliver a rendered email.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Transport name for logs.
    fn name(&self) -> &str;

    async fn send(&self, email: &RenderedEmail) -> Result<(), NotificationError>;
}

/// Writes emails to the log instead of sending them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), NotificationError> {
        tracing::info!(
            kind = %email.kind,
            to = %email.to,
            subject = %email.subject,
            "Email not sent (no transport configured)"
        );
        Ok(())
    }
}

/// Keeps every email in memory. Can be switched to fail every send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<RenderedEmail>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<RenderedEmail> {
        self.sent.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn sent_of_kind(&self, kind: TemplateKind) -> Vec<RenderedEmail> {
        self.sent().into_iter().filter(|e| e.kind == kind).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::DeliveryFailed {
                transport: "recording".into(),
                reason: "configured to fail".into(),
            });
        }
        if let Ok(mut guard) = self.sent.lock() {
            guard.push(email.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> RenderedEmail {
        RenderedEmail {
            kind: TemplateKind::CoachInvite,
            from: "from@example.com".into(),
            to: "to@example.com".into(),
            subject: "Hi".into(),
            text_body: "Body".into(),
        }
    }

    #[tokio::test]
    async fn recording_notifier_captures_and_fails_on_demand() {
        let notifier = RecordingNotifier::new();
        notifier.send(&email()).await.unwrap();
        assert_eq!(notifier.sent().len(), 1);

        notifier.set_failing(true);
        assert!(notifier.send(&email()).await.is_err());
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent_of_kind(TemplateKind::CoachInvite).len(), 1);
        assert!(notifier.sent_of_kind(TemplateKind::StepApproved).is_empty());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send(&email()).await.is_ok());
    }
}
