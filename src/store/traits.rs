//! `Database` trait: row-level persistence for coaches, steps, and profiles.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::catalog::StepKey;
use crate::onboarding::model::{Coach, CoachProfile, CoachStatus, Step};

/// Backend-agnostic datastore.
///
/// Each update is a single-row write; concurrent writers to the same row are
/// last-write-wins.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Coaches ─────────────────────────────────────────────────────

    /// Insert a coach together with its steps and empty profile, atomically.
    async fn insert_coach(
        &self,
        coach: &Coach,
        steps: &[Step],
        profile: &CoachProfile,
    ) -> Result<(), DatabaseError>;

    async fn get_coach(&self, id: Uuid) -> Result<Option<Coach>, DatabaseError>;

    /// Look up a coach by onboarding token (the self-service entry point).
    async fn get_coach_by_token(&self, token: &str) -> Result<Option<Coach>, DatabaseError>;

    /// All coaches, newest first.
    async fn list_coaches(&self) -> Result<Vec<Coach>, DatabaseError>;

    async fn update_coach_status(&self, id: Uuid, status: CoachStatus) -> Result<(), DatabaseError>;

    async fn update_coach_rate(&self, id: Uuid, rate: Option<Decimal>) -> Result<(), DatabaseError>;

    // ── Steps ───────────────────────────────────────────────────────

    async fn get_steps(&self, coach_id: Uuid) -> Result<Vec<Step>, DatabaseError>;

    async fn get_step(&self, coach_id: Uuid, key: StepKey) -> Result<Option<Step>, DatabaseError>;

    /// Overwrite every mutable field of an existing step row.
    async fn update_step(&self, step: &Step) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, coach_id: Uuid) -> Result<Option<CoachProfile>, DatabaseError>;

    async fn update_profile(&self, profile: &CoachProfile) -> Result<(), DatabaseError>;
}
