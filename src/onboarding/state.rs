//! Step state machine. Every step mutation goes through [`apply`].
//!
//! ```text
//!  unsubmitted ──submit──▶ submitted-pending ──approve──▶ approved
//!       ▲                        │
//!       │                 request changes
//!       │                        ▼
//!       └───────────── changes-requested ──resubmit──▶ submitted-pending
//! ```
//!
//! Checkbox and manual steps skip the review cycle and toggle `completed`
//! directly. `apply` is pure: it works on a copy and never mutates the input,
//! so a rejected command leaves nothing behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::HandlingType;
use super::model::{ReviewStatus, Step};

/// Who is issuing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Coach,
    Admin,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coach => write!(f, "coach"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A typed step mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum StepCommand {
    /// Coach uploaded a document (or signed contract).
    SubmitArtifact { file_path: String },
    /// Coach saved the profile form. `complete` is whether the mandatory
    /// fields were filled in.
    SaveProfile { complete: bool },
    /// Coach ticked or unticked a confirmation box.
    ToggleCheckbox { completed: bool },
    /// Admin marked outside work done or not done.
    ToggleManual { completed: bool },
    /// Admin attached the unsigned contract.
    AttachContract { admin_file_path: String },
    Approve,
    RequestChanges { feedback: String },
}

impl StepCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitArtifact { .. } => "submit_artifact",
            Self::SaveProfile { .. } => "save_profile",
            Self::ToggleCheckbox { .. } => "toggle_checkbox",
            Self::ToggleManual { .. } => "toggle_manual",
            Self::AttachContract { .. } => "attach_contract",
            Self::Approve => "approve",
            Self::RequestChanges { .. } => "request_changes",
        }
    }
}

/// Why a command was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Feedback is required when requesting changes")]
    EmptyFeedback,

    #[error("{command} does not apply to {handling} steps")]
    WrongHandling {
        command: &'static str,
        handling: HandlingType,
    },

    #[error("{command} cannot be performed by the {actor}")]
    WrongActor { command: &'static str, actor: Actor },

    #[error("Step has not been submitted, nothing to review")]
    NotSubmitted,
}

/// Review decision carried by a transition, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    None,
    Approved,
    ChangesRequested { feedback: String },
}

/// Result of a successful [`apply`].
#[derive(Debug, Clone)]
pub struct Transition {
    pub step: Step,
    pub review: ReviewOutcome,
    /// False when the command was accepted but left the step as it was
    /// (an incomplete profile save).
    pub changed: bool,
}

impl Transition {
    fn updated(step: Step) -> Self {
        Self {
            step,
            review: ReviewOutcome::None,
            changed: true,
        }
    }
}

/// Apply `command` to `step`, returning the updated step.
pub fn apply(
    step: &Step,
    handling: HandlingType,
    command: StepCommand,
    actor: Actor,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    let name = command.name();
    let mut next = step.clone();

    match command {
        StepCommand::SubmitArtifact { file_path } => {
            require_actor(name, actor, Actor::Coach)?;
            require_handling(name, handling, &[HandlingType::Upload, HandlingType::Contract])?;
            next.file_path = Some(file_path);
            mark_submitted(&mut next, now);
            Ok(Transition::updated(next))
        }
        StepCommand::SaveProfile { complete } => {
            require_actor(name, actor, Actor::Coach)?;
            require_handling(name, handling, &[HandlingType::Form])?;
            if !complete {
                return Ok(Transition {
                    step: next,
                    review: ReviewOutcome::None,
                    changed: false,
                });
            }
            mark_submitted(&mut next, now);
            Ok(Transition::updated(next))
        }
        StepCommand::ToggleCheckbox { completed } => {
            require_actor(name, actor, Actor::Coach)?;
            require_handling(name, handling, &[HandlingType::Checkbox])?;
            set_completed(&mut next, completed, now);
            Ok(Transition::updated(next))
        }
        StepCommand::ToggleManual { completed } => {
            require_actor(name, actor, Actor::Admin)?;
            require_handling(name, handling, &[HandlingType::Manual])?;
            set_completed(&mut next, completed, now);
            Ok(Transition::updated(next))
        }
        StepCommand::AttachContract { admin_file_path } => {
            require_actor(name, actor, Actor::Admin)?;
            require_handling(name, handling, &[HandlingType::Contract])?;
            next.admin_file_path = Some(admin_file_path);
            Ok(Transition::updated(next))
        }
        StepCommand::Approve => {
            require_reviewable(name, handling, actor, &next)?;
            next.review_status = ReviewStatus::Approved;
            next.review_feedback = None;
            next.reviewed_at = Some(now);
            Ok(Transition {
                step: next,
                review: ReviewOutcome::Approved,
                changed: true,
            })
        }
        StepCommand::RequestChanges { feedback } => {
            let feedback = feedback.trim();
            if feedback.is_empty() {
                return Err(TransitionError::EmptyFeedback);
            }
            require_reviewable(name, handling, actor, &next)?;
            next.review_status = ReviewStatus::ChangesRequested;
            next.review_feedback = Some(feedback.to_string());
            next.reviewed_at = Some(now);
            next.completed = false;
            next.completed_at = None;
            Ok(Transition {
                step: next,
                review: ReviewOutcome::ChangesRequested {
                    feedback: feedback.to_string(),
                },
                changed: true,
            })
        }
    }
}

/// Move to submitted-pending, clearing any earlier review.
fn mark_submitted(step: &mut Step, now: DateTime<Utc>) {
    step.completed = true;
    step.completed_at = Some(now);
    step.review_status = ReviewStatus::Pending;
    step.review_feedback = None;
    step.reviewed_at = None;
}

fn set_completed(step: &mut Step, completed: bool, now: DateTime<Utc>) {
    step.completed = completed;
    step.completed_at = completed.then_some(now);
}

fn require_actor(command: &'static str, actor: Actor, expected: Actor) -> Result<(), TransitionError> {
    if actor == expected {
        Ok(())
    } else {
        Err(TransitionError::WrongActor { command, actor })
    }
}

fn require_handling(
    command: &'static str,
    handling: HandlingType,
    allowed: &[HandlingType],
) -> Result<(), TransitionError> {
    if allowed.contains(&handling) {
        Ok(())
    } else {
        Err(TransitionError::WrongHandling { command, handling })
    }
}

fn require_reviewable(
    command: &'static str,
    handling: HandlingType,
    actor: Actor,
    step: &Step,
) -> Result<(), TransitionError> {
    require_actor(command, actor, Actor::Admin)?;
    if !handling.is_reviewable() {
        return Err(TransitionError::WrongHandling { command, handling });
    }
    if !step.completed {
        return Err(TransitionError::NotSubmitted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::catalog::StepKey;
    use crate::onboarding::model::StepPhase;
    use uuid::Uuid;

    fn step(key: StepKey) -> Step {
        Step::new(Uuid::new_v4(), key)
    }

    fn run(step: &Step, command: StepCommand, actor: Actor) -> Result<Transition, TransitionError> {
        apply(step, step.key.handling(), command, actor, Utc::now())
    }

    fn submit(path: &str) -> StepCommand {
        StepCommand::SubmitArtifact {
            file_path: path.into(),
        }
    }

    fn request_changes(text: &str) -> StepCommand {
        StepCommand::RequestChanges {
            feedback: text.into(),
        }
    }

    /// Invariants that must hold after every transition.
    fn assert_invariants(s: &Step) {
        if s.review_status == ReviewStatus::ChangesRequested {
            assert!(!s.completed);
            assert!(s.review_feedback.is_some());
        }
        if s.review_status == ReviewStatus::Approved {
            assert!(s.completed);
        }
        if s.review_feedback.is_some() {
            assert_eq!(s.review_status, ReviewStatus::ChangesRequested);
        }
        if !s.completed {
            assert!(s.completed_at.is_none());
        }
    }

    #[test]
    fn submit_moves_upload_to_submitted_pending() {
        let s = step(StepKey::W9);
        let t = run(&s, submit("c/w9-1.pdf"), Actor::Coach).unwrap();
        assert!(t.step.completed);
        assert!(t.step.completed_at.is_some());
        assert_eq!(t.step.file_path.as_deref(), Some("c/w9-1.pdf"));
        assert_eq!(t.step.phase(), StepPhase::SubmittedPending);
        assert_eq!(t.review, ReviewOutcome::None);
        assert_invariants(&t.step);
        // Input untouched.
        assert!(!s.completed);
    }

    #[test]
    fn w9_rejection_and_resubmission_scenario() {
        let s = step(StepKey::W9);
        let submitted = run(&s, submit("c/w9-1.pdf"), Actor::Coach).unwrap().step;

        let rejected = run(&submitted, request_changes("blurry scan"), Actor::Admin).unwrap();
        assert!(!rejected.step.completed);
        assert!(rejected.step.completed_at.is_none());
        assert_eq!(rejected.step.review_status, ReviewStatus::ChangesRequested);
        assert_eq!(rejected.step.review_feedback.as_deref(), Some("blurry scan"));
        assert!(rejected.step.reviewed_at.is_some());
        assert_eq!(
            rejected.review,
            ReviewOutcome::ChangesRequested {
                feedback: "blurry scan".into()
            }
        );
        assert_invariants(&rejected.step);

        let resubmitted = run(&rejected.step, submit("c/w9-2.pdf"), Actor::Coach).unwrap().step;
        assert!(resubmitted.completed);
        assert_eq!(resubmitted.review_status, ReviewStatus::Pending);
        assert!(resubmitted.review_feedback.is_none());
        assert!(resubmitted.reviewed_at.is_none());
        assert_eq!(resubmitted.file_path.as_deref(), Some("c/w9-2.pdf"));
        assert_invariants(&resubmitted);
    }

    #[test]
    fn empty_feedback_is_rejected_first() {
        let s = step(StepKey::W9);
        let submitted = run(&s, submit("p"), Actor::Coach).unwrap().step;
        assert_eq!(
            run(&submitted, request_changes("   "), Actor::Admin).unwrap_err(),
            TransitionError::EmptyFeedback
        );
        // Even when the step is not reviewable at all.
        assert_eq!(
            run(&step(StepKey::Zoom), request_changes(""), Actor::Admin).unwrap_err(),
            TransitionError::EmptyFeedback
        );
    }

    #[test]
    fn feedback_is_trimmed() {
        let submitted = run(&step(StepKey::Headshot), submit("p"), Actor::Coach).unwrap().step;
        let t = run(&submitted, request_changes("  crop tighter \n"), Actor::Admin).unwrap();
        assert_eq!(t.step.review_feedback.as_deref(), Some("crop tighter"));
    }

    #[test]
    fn approve_requires_submission() {
        let s = step(StepKey::W9);
        assert_eq!(
            run(&s, StepCommand::Approve, Actor::Admin).unwrap_err(),
            TransitionError::NotSubmitted
        );
    }

    #[test]
    fn approve_is_terminal_and_idempotent() {
        let submitted = run(&step(StepKey::Headshot), submit("p"), Actor::Coach).unwrap().step;
        let once = run(&submitted, StepCommand::Approve, Actor::Admin).unwrap();
        assert_eq!(once.step.review_status, ReviewStatus::Approved);
        assert!(once.step.completed);
        assert_eq!(once.step.completed_at, submitted.completed_at);
        assert_eq!(once.review, ReviewOutcome::Approved);
        assert_invariants(&once.step);

        let twice = run(&once.step, StepCommand::Approve, Actor::Admin).unwrap();
        assert_eq!(twice.step.review_status, ReviewStatus::Approved);
        assert!(twice.step.completed);
        assert_eq!(twice.step.file_path, once.step.file_path);
    }

    #[test]
    fn review_is_admin_only() {
        let submitted = run(&step(StepKey::W9), submit("p"), Actor::Coach).unwrap().step;
        assert!(matches!(
            run(&submitted, StepCommand::Approve, Actor::Coach),
            Err(TransitionError::WrongActor { .. })
        ));
    }

    #[test]
    fn manual_and_checkbox_steps_are_not_reviewable() {
        let manual = run(
            &step(StepKey::Zoom),
            StepCommand::ToggleManual { completed: true },
            Actor::Admin,
        )
        .unwrap()
        .step;
        assert!(matches!(
            run(&manual, StepCommand::Approve, Actor::Admin),
            Err(TransitionError::WrongHandling { .. })
        ));

        let checked = run(
            &step(StepKey::DeckReviewed),
            StepCommand::ToggleCheckbox { completed: true },
            Actor::Coach,
        )
        .unwrap()
        .step;
        assert!(matches!(
            run(&checked, request_changes("why"), Actor::Admin),
            Err(TransitionError::WrongHandling { .. })
        ));
    }

    #[test]
    fn checkbox_toggles_both_ways_without_review() {
        let s = step(StepKey::DeckReviewed);
        let on = run(&s, StepCommand::ToggleCheckbox { completed: true }, Actor::Coach).unwrap();
        assert!(on.step.completed);
        assert!(on.step.completed_at.is_some());
        assert_eq!(on.step.review_status, ReviewStatus::Pending);

        let off = run(&on.step, StepCommand::ToggleCheckbox { completed: false }, Actor::Coach)
            .unwrap();
        assert!(!off.step.completed);
        assert!(off.step.completed_at.is_none());
        assert_invariants(&off.step);
    }

    #[test]
    fn manual_steps_belong_to_admin() {
        let s = step(StepKey::BackgroundCheck);
        assert!(matches!(
            run(&s, StepCommand::ToggleManual { completed: true }, Actor::Coach),
            Err(TransitionError::WrongActor { .. })
        ));
        assert!(matches!(
            run(&s, StepCommand::ToggleCheckbox { completed: true }, Actor::Coach),
            Err(TransitionError::WrongHandling { .. })
        ));
        let t = run(&s, StepCommand::ToggleManual { completed: true }, Actor::Admin).unwrap();
        assert!(t.step.completed);
        assert!(t.step.file_path.is_none());
    }

    #[test]
    fn incomplete_profile_save_does_not_advance() {
        let s = step(StepKey::Profile);
        let t = run(&s, StepCommand::SaveProfile { complete: false }, Actor::Coach).unwrap();
        assert!(!t.changed);
        assert_eq!(t.step, s);
    }

    #[test]
    fn complete_profile_save_clears_prior_rejection() {
        let s = step(StepKey::Profile);
        let saved = run(&s, StepCommand::SaveProfile { complete: true }, Actor::Coach).unwrap().step;
        assert_eq!(saved.phase(), StepPhase::SubmittedPending);
        assert!(saved.file_path.is_none());

        let rejected = run(&saved, request_changes("add credentials"), Actor::Admin).unwrap().step;
        let again = run(&rejected, StepCommand::SaveProfile { complete: true }, Actor::Coach)
            .unwrap()
            .step;
        assert_eq!(again.review_status, ReviewStatus::Pending);
        assert!(again.review_feedback.is_none());
        assert!(again.completed);
    }

    #[test]
    fn profile_step_does_not_accept_uploads() {
        assert!(matches!(
            run(&step(StepKey::Profile), submit("p"), Actor::Coach),
            Err(TransitionError::WrongHandling { .. })
        ));
    }

    #[test]
    fn contract_files_are_independent() {
        let s = step(StepKey::Contract1099);
        let attached = run(
            &s,
            StepCommand::AttachContract {
                admin_file_path: "c/admin-1099-1.pdf".into(),
            },
            Actor::Admin,
        )
        .unwrap()
        .step;
        assert_eq!(attached.admin_file_path.as_deref(), Some("c/admin-1099-1.pdf"));
        assert!(!attached.completed);
        assert!(attached.file_path.is_none());

        // Attaching alone does not make the step approvable.
        assert_eq!(
            run(&attached, StepCommand::Approve, Actor::Admin).unwrap_err(),
            TransitionError::NotSubmitted
        );

        let signed = run(&attached, submit("c/1099-2.pdf"), Actor::Coach).unwrap().step;
        assert_eq!(signed.admin_file_path.as_deref(), Some("c/admin-1099-1.pdf"));
        assert_eq!(signed.file_path.as_deref(), Some("c/1099-2.pdf"));

        // Re-attaching does not disturb the coach's submission.
        let reattached = run(
            &signed,
            StepCommand::AttachContract {
                admin_file_path: "c/admin-1099-3.pdf".into(),
            },
            Actor::Admin,
        )
        .unwrap()
        .step;
        assert!(reattached.completed);
        assert_eq!(reattached.file_path.as_deref(), Some("c/1099-2.pdf"));

        let approved = run(&reattached, StepCommand::Approve, Actor::Admin).unwrap().step;
        assert_eq!(approved.review_status, ReviewStatus::Approved);
    }

    #[test]
    fn contract_approvable_without_admin_file() {
        let signed = run(&step(StepKey::Contract1099), submit("c/1099.pdf"), Actor::Coach)
            .unwrap()
            .step;
        assert!(signed.admin_file_path.is_none());
        assert!(run(&signed, StepCommand::Approve, Actor::Admin).is_ok());
    }

    #[test]
    fn attach_contract_only_on_contract_steps() {
        assert!(matches!(
            run(
                &step(StepKey::W9),
                StepCommand::AttachContract {
                    admin_file_path: "x".into()
                },
                Actor::Admin
            ),
            Err(TransitionError::WrongHandling { .. })
        ));
    }

    #[test]
    fn command_serde_is_tagged() {
        let cmd: StepCommand =
            serde_json::from_str(r#"{"command":"request_changes","feedback":"redo"}"#).unwrap();
        assert_eq!(cmd, request_changes("redo"));
        let json = serde_json::to_value(StepCommand::Approve).unwrap();
        assert_eq!(json["command"], "approve");
    }
}
