//! OnboardingService coordinates the datastore, blob storage, the step
//! state machine, status aggregation, and outbound email.
//!
//! Every step mutation follows the same sequence:
//!
//! 1. Load the step and run the command through [`state::apply`].
//! 2. Persist the updated step.
//! 3. Re-read all steps, aggregate the coach status, persist it if changed.
//! 4. Send whatever emails the transition and status change call for.
//!
//! Email failures never undo steps 2 and 3. They are logged and handed back
//! to the caller in [`Outcome::notification_error`].

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::catalog::{ONBOARDING_STEPS, StepKey, is_known_specialty};
use super::model::{
    Coach, CoachDetail, CoachProfile, CoachSummary, NewCoach, ProfileUpdate, Step, StepView,
    validate_rate,
};
use super::state::{self, Actor, StepCommand, Transition};
use super::status::{self, StatusChange};
use super::submission::{self, StoredFile, Upload};
use crate::error::{Error, Result, StorageError, ValidationError};
use crate::notify::{
    MailSettings, NotificationIntent, Notifier, intent_for_created, intent_for_review,
    intent_for_status_change, render,
};
use crate::storage::BlobStore;
use crate::store::Database;

/// A committed mutation plus the email error, if delivery failed.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    #[serde(flatten)]
    pub value: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_error: Option<String>,
}

impl<T> Outcome<T> {
    fn new(value: T, notification_error: Option<String>) -> Self {
        Self {
            value,
            notification_error,
        }
    }
}

/// Result of a profile save.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSaved {
    pub profile: CoachProfile,
    pub step: Step,
    /// Whether the save moved the profile step to submitted.
    pub advanced: bool,
}

pub struct OnboardingService {
    db: Arc<dyn Database>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
    mail: MailSettings,
}

impl OnboardingService {
    pub fn new(
        db: Arc<dyn Database>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        mail: MailSettings,
    ) -> Self {
        Self {
            db,
            blobs,
            notifier,
            mail,
        }
    }

    // ── Admin: roster ───────────────────────────────────────────────

    /// Create a coach with a fresh token, the full step set, and an empty
    /// profile, then send the invite.
    pub async fn create_coach(&self, input: NewCoach) -> Result<Outcome<CoachDetail>> {
        input.validate()?;

        let coach = Coach::new(&input);
        let steps = Step::full_set(coach.id);
        let profile = CoachProfile::empty(coach.id);
        self.db.insert_coach(&coach, &steps, &profile).await?;
        tracing::info!(coach_id = %coach.id, email = %coach.email, "Coach created");

        let notification_error = self.deliver(&intent_for_created(&coach)).await;
        let detail = build_detail(coach, Some(profile), steps);
        Ok(Outcome::new(detail, notification_error))
    }

    /// Every coach with progress counts, newest first.
    pub async fn list_coaches(&self) -> Result<Vec<CoachSummary>> {
        let coaches = self.db.list_coaches().await?;
        let mut summaries = Vec::with_capacity(coaches.len());
        for coach in coaches {
            let steps = self.db.get_steps(coach.id).await?;
            let (completed_steps, total_steps) = status::progress(&steps);
            summaries.push(CoachSummary {
                coach,
                completed_steps,
                total_steps,
            });
        }
        Ok(summaries)
    }

    pub async fn coach_detail(&self, coach_id: Uuid) -> Result<CoachDetail> {
        let coach = self.coach_by_id(coach_id).await?;
        self.detail_for(coach).await
    }

    pub async fn set_hourly_rate(&self, coach_id: Uuid, rate: Option<Decimal>) -> Result<Coach> {
        validate_rate(rate)?;
        let mut coach = self.coach_by_id(coach_id).await?;
        self.db.update_coach_rate(coach_id, rate).await?;
        coach.hourly_rate = rate;
        tracing::info!(%coach_id, rate = ?rate, "Hourly rate updated");
        Ok(coach)
    }

    // ── Admin: step actions ─────────────────────────────────────────

    pub async fn toggle_manual(
        &self,
        coach_id: Uuid,
        key: StepKey,
        completed: bool,
    ) -> Result<Outcome<Step>> {
        let coach = self.coach_by_id(coach_id).await?;
        self.mutate_step(
            &coach,
            key,
            StepCommand::ToggleManual { completed },
            Actor::Admin,
        )
        .await
    }

    /// Upload the unsigned contract for the coach to download.
    pub async fn attach_contract(
        &self,
        coach_id: Uuid,
        key: StepKey,
        upload: Upload,
    ) -> Result<Outcome<Step>> {
        let coach = self.coach_by_id(coach_id).await?;
        let placeholder = StepCommand::AttachContract {
            admin_file_path: String::new(),
        };
        self.dry_run(&coach, key, placeholder, Actor::Admin).await?;

        let command = submission::store_upload(
            self.blobs.as_ref(),
            coach.id,
            key,
            &upload,
            Actor::Admin,
            Utc::now(),
        )
        .await?;
        self.mutate_step(&coach, key, command, Actor::Admin).await
    }

    pub async fn approve(&self, coach_id: Uuid, key: StepKey) -> Result<Outcome<Step>> {
        let coach = self.coach_by_id(coach_id).await?;
        self.mutate_step(&coach, key, StepCommand::Approve, Actor::Admin)
            .await
    }

    pub async fn request_changes(
        &self,
        coach_id: Uuid,
        key: StepKey,
        feedback: String,
    ) -> Result<Outcome<Step>> {
        let coach = self.coach_by_id(coach_id).await?;
        self.mutate_step(
            &coach,
            key,
            StepCommand::RequestChanges { feedback },
            Actor::Admin,
        )
        .await
    }

    /// Fetch a stored artifact that belongs to this coach.
    pub async fn download(&self, coach_id: Uuid, path: &str) -> Result<StoredFile> {
        self.coach_by_id(coach_id).await?;
        let steps = self.db.get_steps(coach_id).await?;
        let owned = steps.iter().any(|s| {
            s.file_path.as_deref() == Some(path) || s.admin_file_path.as_deref() == Some(path)
        });
        if !owned {
            return Err(ValidationError::ForeignFile {
                path: path.to_string(),
            }
            .into());
        }
        self.fetch_blob(path).await
    }

    // ── Coach portal ────────────────────────────────────────────────

    /// Everything the coach sees behind their onboarding link.
    pub async fn portal(&self, token: &str) -> Result<CoachDetail> {
        let coach = self.coach_by_token(token).await?;
        self.detail_for(coach).await
    }

    /// Store an uploaded document and mark the step submitted.
    ///
    /// The command is checked against the step before anything is stored, so
    /// a refused upload leaves no orphan object behind.
    pub async fn submit_artifact(
        &self,
        token: &str,
        key: StepKey,
        upload: Upload,
    ) -> Result<Outcome<Step>> {
        let coach = self.coach_by_token(token).await?;
        let placeholder = StepCommand::SubmitArtifact {
            file_path: String::new(),
        };
        self.dry_run(&coach, key, placeholder, Actor::Coach).await?;

        let command = submission::store_upload(
            self.blobs.as_ref(),
            coach.id,
            key,
            &upload,
            Actor::Coach,
            Utc::now(),
        )
        .await?;
        self.mutate_step(&coach, key, command, Actor::Coach).await
    }

    /// Save the profile form. The profile step advances only when bio and at
    /// least one specialty are present.
    pub async fn save_profile(
        &self,
        token: &str,
        update: ProfileUpdate,
    ) -> Result<Outcome<ProfileSaved>> {
        if let Some(unknown) = update.specialties.iter().find(|s| !is_known_specialty(s)) {
            return Err(ValidationError::UnknownSpecialty(unknown.clone()).into());
        }

        let coach = self.coach_by_token(token).await?;
        let now = Utc::now();
        let mut profile = self
            .db
            .get_profile(coach.id)
            .await?
            .unwrap_or_else(|| CoachProfile::empty(coach.id));
        profile.apply(&update, now);
        self.db.update_profile(&profile).await?;

        let complete = update.is_complete();
        let outcome = self
            .mutate_step(
                &coach,
                StepKey::Profile,
                StepCommand::SaveProfile { complete },
                Actor::Coach,
            )
            .await?;
        tracing::info!(coach_id = %coach.id, complete, "Profile saved");

        Ok(Outcome::new(
            ProfileSaved {
                profile,
                step: outcome.value,
                advanced: complete,
            },
            outcome.notification_error,
        ))
    }

    /// Coach ticks or unticks a confirmation step.
    pub async fn set_deck_reviewed(
        &self,
        token: &str,
        key: StepKey,
        completed: bool,
    ) -> Result<Outcome<Step>> {
        let coach = self.coach_by_token(token).await?;
        self.mutate_step(
            &coach,
            key,
            StepCommand::ToggleCheckbox { completed },
            Actor::Coach,
        )
        .await
    }

    /// The unsigned contract the admin attached to `key`.
    pub async fn download_contract(&self, token: &str, key: StepKey) -> Result<StoredFile> {
        let coach = self.coach_by_token(token).await?;
        let step = self.step_for(&coach, key).await?;
        let path = step
            .admin_file_path
            .ok_or_else(|| Error::not_found("contract", format!("{}/{}", coach.id, key)))?;
        self.fetch_blob(&path).await
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn coach_by_id(&self, coach_id: Uuid) -> Result<Coach> {
        self.db
            .get_coach(coach_id)
            .await?
            .ok_or_else(|| Error::not_found("coach", coach_id))
    }

    async fn coach_by_token(&self, token: &str) -> Result<Coach> {
        match self.db.get_coach_by_token(token).await? {
            Some(coach) => Ok(coach),
            None => {
                tracing::debug!("Unknown onboarding token");
                Err(Error::not_found("onboarding link", "token"))
            }
        }
    }

    async fn step_for(&self, coach: &Coach, key: StepKey) -> Result<Step> {
        self.db
            .get_step(coach.id, key)
            .await?
            .ok_or_else(|| Error::not_found("step", format!("{}/{}", coach.id, key)))
    }

    async fn detail_for(&self, coach: Coach) -> Result<CoachDetail> {
        let steps = self.db.get_steps(coach.id).await?;
        let profile = self.db.get_profile(coach.id).await?;
        Ok(build_detail(coach, profile, steps))
    }

    async fn fetch_blob(&self, path: &str) -> Result<StoredFile> {
        match self.blobs.download(path).await {
            Ok(bytes) => Ok(StoredFile {
                path: path.to_string(),
                bytes,
            }),
            Err(StorageError::ObjectNotFound(_)) => Err(Error::not_found("file", path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Check that `command` would be accepted without persisting anything.
    async fn dry_run(
        &self,
        coach: &Coach,
        key: StepKey,
        command: StepCommand,
        actor: Actor,
    ) -> Result<()> {
        let step = self.step_for(coach, key).await?;
        state::apply(&step, key.handling(), command, actor, Utc::now())?;
        Ok(())
    }

    /// Apply, persist, re-aggregate, notify.
    async fn mutate_step(
        &self,
        coach: &Coach,
        key: StepKey,
        command: StepCommand,
        actor: Actor,
    ) -> Result<Outcome<Step>> {
        let step = self.step_for(coach, key).await?;
        let command_name = command.name();
        let Transition {
            step: updated,
            review,
            changed,
        } = state::apply(&step, key.handling(), command, actor, Utc::now()).map_err(|e| {
            tracing::debug!(coach_id = %coach.id, step = %key, command = command_name, error = %e, "Command refused");
            e
        })?;

        if !changed {
            return Ok(Outcome::new(updated, None));
        }

        self.db.update_step(&updated).await?;
        tracing::info!(
            coach_id = %coach.id,
            step = %key,
            command = command_name,
            %actor,
            completed = updated.completed,
            review_status = %updated.review_status,
            "Step updated"
        );

        let change = self.refresh_status(coach).await?;

        let mut intents: Vec<NotificationIntent> = Vec::new();
        intents.extend(intent_for_review(coach, key.entry(), &review));
        intents.extend(intent_for_status_change(coach, change));

        let mut notification_error = None;
        for intent in &intents {
            if let Some(err) = self.deliver(intent).await {
                notification_error.get_or_insert(err);
            }
        }
        Ok(Outcome::new(updated, notification_error))
    }

    /// Recompute the coach status from stored steps and write it if it moved.
    async fn refresh_status(&self, coach: &Coach) -> Result<StatusChange> {
        let steps = self.db.get_steps(coach.id).await?;
        let change = StatusChange::new(coach.status, status::aggregate(&steps));
        if change.is_change() {
            self.db.update_coach_status(coach.id, change.current).await?;
            tracing::info!(
                coach_id = %coach.id,
                from = %change.previous,
                to = %change.current,
                "Coach status changed"
            );
        }
        Ok(change)
    }

    /// Render and send one email. Returns the error text on failure.
    async fn deliver(&self, intent: &NotificationIntent) -> Option<String> {
        let email = render(intent, &self.mail);
        match self.notifier.send(&email).await {
            Ok(()) => {
                tracing::info!(kind = %email.kind, to = %email.to, transport = self.notifier.name(), "Email sent");
                None
            }
            Err(e) => {
                tracing::warn!(kind = %email.kind, to = %email.to, transport = self.notifier.name(), error = %e, "Email delivery failed");
                Some(e.to_string())
            }
        }
    }
}

/// Join steps with catalog entries, in catalog order.
fn build_detail(coach: Coach, profile: Option<CoachProfile>, steps: Vec<Step>) -> CoachDetail {
    let (completed_steps, total_steps) = status::progress(&steps);
    let views = ONBOARDING_STEPS
        .iter()
        .filter_map(|entry| {
            steps
                .iter()
                .find(|s| s.key == entry.key)
                .map(|s| StepView::new(s.clone(), entry))
        })
        .collect();
    CoachDetail {
        coach,
        profile,
        steps: views,
        completed_steps,
        total_steps,
    }
}
