//! Plain-text rendering of the four email templates.

use serde::Serialize;

use super::intent::{NotificationIntent, TemplateKind};
use crate::onboarding::catalog;

/// Sender identity and link targets for rendered mail.
#[derive(Debug, Clone)]
pub struct MailSettings {
    /// `From:` header, e.g. `Boon <onboarding@example.com>`.
    pub from: String,
    /// Recipient of the all-steps-complete alert.
    pub admin_email: String,
    /// Base URL used to build portal and admin links.
    pub app_url: String,
}

impl MailSettings {
    pub fn onboarding_url(&self, token: &str) -> String {
        format!("{}/onboard/{}", self.app_url.trim_end_matches('/'), token)
    }

    pub fn admin_url(&self, coach_id: &uuid::Uuid) -> String {
        format!("{}/admin/coaches/{}", self.app_url.trim_end_matches('/'), coach_id)
    }
}

/// A message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub kind: TemplateKind,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
}

const FOOTER: &str = "Boon Leadership Development";

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

pub fn render(intent: &NotificationIntent, settings: &MailSettings) -> RenderedEmail {
    let to = intent.recipient(&settings.admin_email).to_string();

    let (subject, body) = match intent {
        NotificationIntent::CoachInvite {
            coach_name, token, ..
        } => (
            "Welcome to Boon - Start Your Onboarding".to_string(),
            format!(
                "Hi {name},\n\n\
                 We are excited to have you join our coaching team. To get started, please \
                 complete your onboarding by visiting the link below.\n\n\
                 You will be asked to:\n{checklist}\n\
                 Start onboarding: {url}\n\n\
                 Your progress is saved automatically, so you can return to your onboarding \
                 portal at any time using the same link.",
                name = first_name(coach_name),
                checklist = coach_checklist(),
                url = settings.onboarding_url(token),
            ),
        ),
        NotificationIntent::ChangesRequested {
            coach_name,
            token,
            step_label,
            feedback,
            ..
        } => (
            format!("Changes Requested: {step_label}"),
            format!(
                "Hi {name}, the admin team has reviewed your {step_label} submission and has \
                 requested some changes.\n\n\
                 Feedback:\n{feedback}\n\n\
                 Please update your submission at your earliest convenience.\n\n\
                 Update submission: {url}",
                name = first_name(coach_name),
                url = settings.onboarding_url(token),
            ),
        ),
        NotificationIntent::StepApproved {
            coach_name,
            token,
            step_label,
            ..
        } => (
            format!("Approved: {step_label}"),
            format!(
                "Your {step_label} submission has been approved.\n\n\
                 Great work, {name}! Keep going to complete your remaining onboarding steps.\n\n\
                 View progress: {url}",
                name = first_name(coach_name),
                url = settings.onboarding_url(token),
            ),
        ),
        NotificationIntent::AllStepsComplete {
            coach_id,
            coach_name,
            coach_email,
        } => (
            format!("Onboarding Complete: {coach_name}"),
            format!(
                "{coach_name} ({coach_email}) has completed all {total} onboarding steps.\n\n\
                 All documents have been submitted and the coach profile is ready for review.\n\n\
                 Review coach profile: {url}",
                total = catalog::total_steps(),
                url = settings.admin_url(coach_id),
            ),
        ),
    };

    RenderedEmail {
        kind: intent.kind(),
        from: settings.from.clone(),
        to,
        subject,
        text_body: format!("{body}\n\n--\n{FOOTER}\n"),
    }
}

/// Bullet list of the steps a coach completes themselves.
fn coach_checklist() -> String {
    catalog::ONBOARDING_STEPS
        .iter()
        .filter(|e| e.handling.coach_actionable())
        .map(|e| format!("  - {}\n", e.label))
        .collect()
}
