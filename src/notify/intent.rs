//! Notification intents: which email a state change calls for.

use serde::Serialize;
use uuid::Uuid;

use crate::onboarding::catalog::CatalogEntry;
use crate::onboarding::model::Coach;
use crate::onboarding::state::ReviewOutcome;
use crate::onboarding::status::StatusChange;

/// The four message templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    CoachInvite,
    ChangesRequested,
    StepApproved,
    AllStepsComplete,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoachInvite => "coach-invite",
            Self::ChangesRequested => "changes-requested",
            Self::StepApproved => "step-approved",
            Self::AllStepsComplete => "all-steps-complete",
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data needed to render one outbound email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationIntent {
    CoachInvite {
        coach_name: String,
        coach_email: String,
        token: String,
    },
    ChangesRequested {
        coach_name: String,
        coach_email: String,
        token: String,
        step_label: String,
        feedback: String,
    },
    StepApproved {
        coach_name: String,
        coach_email: String,
        token: String,
        step_label: String,
    },
    /// Addressed to the admin, not the coach.
    AllStepsComplete {
        coach_id: Uuid,
        coach_name: String,
        coach_email: String,
    },
}

impl NotificationIntent {
    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::CoachInvite { .. } => TemplateKind::CoachInvite,
            Self::ChangesRequested { .. } => TemplateKind::ChangesRequested,
            Self::StepApproved { .. } => TemplateKind::StepApproved,
            Self::AllStepsComplete { .. } => TemplateKind::AllStepsComplete,
        }
    }

    /// Who receives this email.
    pub fn recipient<'a>(&'a self, admin_email: &'a str) -> &'a str {
        match self {
            Self::CoachInvite { coach_email, .. }
            | Self::ChangesRequested { coach_email, .. }
            | Self::StepApproved { coach_email, .. } => coach_email,
            Self::AllStepsComplete { .. } => admin_email,
        }
    }
}

/// Invite sent when the admin creates a coach.
pub fn intent_for_created(coach: &Coach) -> NotificationIntent {
    NotificationIntent::CoachInvite {
        coach_name: coach.name.clone(),
        coach_email: coach.email.clone(),
        token: coach.onboarding_token.clone(),
    }
}

/// Email for a review decision, if the transition carried one.
pub fn intent_for_review(
    coach: &Coach,
    entry: &CatalogEntry,
    outcome: &ReviewOutcome,
) -> Option<NotificationIntent> {
    match outcome {
        ReviewOutcome::None => None,
        ReviewOutcome::Approved => Some(NotificationIntent::StepApproved {
            coach_name: coach.name.clone(),
            coach_email: coach.email.clone(),
            token: coach.onboarding_token.clone(),
            step_label: entry.label.to_string(),
        }),
        ReviewOutcome::ChangesRequested { feedback } => Some(NotificationIntent::ChangesRequested {
            coach_name: coach.name.clone(),
            coach_email: coach.email.clone(),
            token: coach.onboarding_token.clone(),
            step_label: entry.label.to_string(),
            feedback: feedback.clone(),
        }),
    }
}

/// Admin alert, fired only on the edge into `complete`.
pub fn intent_for_status_change(coach: &Coach, change: StatusChange) -> Option<NotificationIntent> {
    change
        .became_complete()
        .then(|| NotificationIntent::AllStepsComplete {
            coach_id: coach.id,
            coach_name: coach.name.clone(),
            coach_email: coach.email.clone(),
        })
}
