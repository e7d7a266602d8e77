//! Coach, step, and profile data models.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::{CatalogEntry, ONBOARDING_STEPS, StepKey};
use crate::error::ValidationError;

/// Length of the capability token embedded in `/onboard/{token}`.
pub const TOKEN_LENGTH: usize = 32;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Overall onboarding status, always derived from the coach's steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoachStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
}

impl CoachStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for CoachStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CoachStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            other => Err(format!("unknown coach status: {other}")),
        }
    }
}

/// Admin review verdict on a submitted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    ChangesRequested,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::ChangesRequested => "changes_requested",
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "changes_requested" => Ok(Self::ChangesRequested),
            other => Err(format!("unknown review status: {other}")),
        }
    }
}

/// A contractor going through onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coach {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Sole credential for the self-service portal.
    pub onboarding_token: String,
    pub status: CoachStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Coach {
    /// Build a fresh coach with a newly generated onboarding token.
    pub fn new(input: &NewCoach) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            onboarding_token: generate_onboarding_token(),
            status: CoachStatus::Pending,
            hourly_rate: input.hourly_rate,
            created_at: Utc::now(),
        }
    }
}

/// Generate an unguessable, URL-safe onboarding token.
pub fn generate_onboarding_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Admin input for creating a coach.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCoach {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub hourly_rate: Option<Decimal>,
}

impl NewCoach {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "name".into(),
            });
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingField {
                field: "email".into(),
            });
        }
        if !EMAIL_RE.is_match(email) {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }
        validate_rate(self.hourly_rate)
    }
}

pub fn validate_rate(rate: Option<Decimal>) -> Result<(), ValidationError> {
    match rate {
        Some(r) if r < Decimal::ZERO => Err(ValidationError::NegativeRate),
        _ => Ok(()),
    }
}

/// Derived lifecycle position of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Unsubmitted,
    SubmittedPending,
    Approved,
    ChangesRequested,
}

/// One checklist item for one coach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub coach_id: Uuid,
    pub key: StepKey,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Coach-submitted artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Admin-supplied artifact (unsigned contract).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_file_path: Option<String>,
    pub review_status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn new(coach_id: Uuid, key: StepKey) -> Self {
        Self {
            coach_id,
            key,
            completed: false,
            completed_at: None,
            file_path: None,
            admin_file_path: None,
            review_status: ReviewStatus::Pending,
            review_feedback: None,
            reviewed_at: None,
        }
    }

    /// One step per catalog entry, in catalog order.
    pub fn full_set(coach_id: Uuid) -> Vec<Step> {
        ONBOARDING_STEPS
            .iter()
            .map(|e| Step::new(coach_id, e.key))
            .collect()
    }

    pub fn phase(&self) -> StepPhase {
        match (self.completed, self.review_status) {
            (false, ReviewStatus::ChangesRequested) => StepPhase::ChangesRequested,
            (false, _) => StepPhase::Unsubmitted,
            (true, ReviewStatus::Approved) => StepPhase::Approved,
            (true, _) => StepPhase::SubmittedPending,
        }
    }
}

/// Coach-maintained profile, one per coach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachProfile {
    pub coach_id: Uuid,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub scheduling_preferences: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CoachProfile {
    pub fn empty(coach_id: Uuid) -> Self {
        Self {
            coach_id,
            bio: None,
            specialties: Vec::new(),
            credentials: None,
            linkedin_url: None,
            scheduling_preferences: None,
            updated_at: Utc::now(),
        }
    }

    /// Overwrite every form field from a coach submission.
    pub fn apply(&mut self, update: &ProfileUpdate, now: DateTime<Utc>) {
        self.bio = non_blank(&update.bio);
        self.specialties = Vec::with_capacity(update.specialties.len());
        for specialty in &update.specialties {
            if !self.specialties.contains(specialty) {
                self.specialties.push(specialty.clone());
            }
        }
        self.credentials = non_blank(&update.credentials);
        self.linkedin_url = non_blank(&update.linkedin_url);
        self.scheduling_preferences = non_blank(&update.scheduling_preferences);
        self.updated_at = now;
    }
}

fn non_blank(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Profile form payload submitted by the coach.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub scheduling_preferences: Option<String>,
}

impl ProfileUpdate {
    /// Bio and at least one specialty are mandatory for the step to advance.
    pub fn is_complete(&self) -> bool {
        let has_bio = self.bio.as_deref().is_some_and(|b| !b.trim().is_empty());
        has_bio && !self.specialties.is_empty()
    }
}

/// Roster row for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CoachSummary {
    #[serde(flatten)]
    pub coach: Coach,
    pub completed_steps: usize,
    pub total_steps: usize,
}

/// A step joined with its catalog definition.
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    #[serde(flatten)]
    pub step: Step,
    pub label: &'static str,
    pub description: &'static str,
    pub handling: super::catalog::HandlingType,
    pub optional: bool,
    pub phase: StepPhase,
}

impl StepView {
    pub fn new(step: Step, entry: &'static CatalogEntry) -> Self {
        let phase = step.phase();
        Self {
            step,
            label: entry.label,
            description: entry.description,
            handling: entry.handling,
            optional: entry.optional,
            phase,
        }
    }
}

/// Everything known about one coach.
#[derive(Debug, Clone, Serialize)]
pub struct CoachDetail {
    pub coach: Coach,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<CoachProfile>,
    pub steps: Vec<StepView>,
    pub completed_steps: usize,
    pub total_steps: usize,
}
