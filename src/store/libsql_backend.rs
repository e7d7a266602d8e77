//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::catalog::StepKey;
use crate::onboarding::model::{Coach, CoachProfile, CoachStatus, ReviewStatus, Step};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use,
/// but a transaction opened on it captures every statement run on it until
/// commit. Writes therefore take `write_lock` first.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_datetime(dt: Option<DateTime<Utc>>) -> libsql::Value {
    match dt {
        Some(dt) => libsql::Value::Text(dt.to_rfc3339()),
        None => libsql::Value::Null,
    }
}

fn query_err(context: &str) -> impl Fn(libsql::Error) -> DatabaseError + '_ {
    move |e| {
        let msg = e.to_string();
        if msg.contains("UNIQUE constraint") || msg.contains("FOREIGN KEY constraint") {
            DatabaseError::Constraint(format!("{context}: {msg}"))
        } else {
            DatabaseError::Query(format!("{context}: {msg}"))
        }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("Bad uuid {s}: {e}")))
}

/// Map a libsql Row to a Coach.
///
/// Column order matches COACH_COLUMNS.
fn row_to_coach(row: &libsql::Row) -> Result<Coach, DatabaseError> {
    let read = query_err("Failed to read coach row");
    let id_str: String = row.get(0).map_err(&read)?;
    let status_str: String = row.get(4).map_err(&read)?;
    let rate_str: Option<String> = row.get::<String>(5).ok();
    let created_str: String = row.get(6).map_err(&read)?;

    let hourly_rate = rate_str
        .map(|r| {
            Decimal::from_str(&r)
                .map_err(|e| DatabaseError::Serialization(format!("Bad hourly rate {r}: {e}")))
        })
        .transpose()?;

    Ok(Coach {
        id: parse_uuid(&id_str)?,
        name: row.get(1).map_err(&read)?,
        email: row.get(2).map_err(&read)?,
        onboarding_token: row.get(3).map_err(&read)?,
        status: CoachStatus::from_str(&status_str).map_err(DatabaseError::Serialization)?,
        hourly_rate,
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql Row to a Step.
///
/// Column order matches STEP_COLUMNS.
fn row_to_step(row: &libsql::Row) -> Result<Step, DatabaseError> {
    let read = query_err("Failed to read step row");
    let coach_id: String = row.get(0).map_err(&read)?;
    let key_str: String = row.get(1).map_err(&read)?;
    let completed: i64 = row.get(2).map_err(&read)?;
    let completed_at: Option<String> = row.get::<String>(3).ok();
    let review_str: String = row.get(6).map_err(&read)?;
    let reviewed_at: Option<String> = row.get::<String>(8).ok();

    Ok(Step {
        coach_id: parse_uuid(&coach_id)?,
        key: StepKey::from_str(&key_str).map_err(DatabaseError::Serialization)?,
        completed: completed != 0,
        completed_at: parse_optional_datetime(&completed_at),
        file_path: row.get::<String>(4).ok(),
        admin_file_path: row.get::<String>(5).ok(),
        review_status: ReviewStatus::from_str(&review_str).map_err(DatabaseError::Serialization)?,
        review_feedback: row.get::<String>(7).ok(),
        reviewed_at: parse_optional_datetime(&reviewed_at),
    })
}

/// Map a libsql Row to a CoachProfile.
///
/// Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<CoachProfile, DatabaseError> {
    let read = query_err("Failed to read profile row");
    let coach_id: String = row.get(0).map_err(&read)?;
    let specialties_json: String = row.get(2).map_err(&read)?;
    let updated_str: String = row.get(6).map_err(&read)?;

    let specialties: Vec<String> = serde_json::from_str(&specialties_json)
        .map_err(|e| DatabaseError::Serialization(format!("Bad specialties JSON: {e}")))?;

    Ok(CoachProfile {
        coach_id: parse_uuid(&coach_id)?,
        bio: row.get::<String>(1).ok(),
        specialties,
        credentials: row.get::<String>(3).ok(),
        linkedin_url: row.get::<String>(4).ok(),
        scheduling_preferences: row.get::<String>(5).ok(),
        updated_at: parse_datetime(&updated_str),
    })
}

const COACH_COLUMNS: &str = "id, name, email, onboarding_token, status, hourly_rate, created_at";

const STEP_COLUMNS: &str = "coach_id, step_key, completed, completed_at, file_path, admin_file_path, review_status, review_feedback, reviewed_at";

const PROFILE_COLUMNS: &str = "coach_id, bio, specialties, credentials, linkedin_url, scheduling_preferences, updated_at";

impl LibSqlBackend {
    async fn query_coaches(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Coach>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(query_err("Failed to query coaches"))?;

        let mut coaches = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(query_err("Failed to read coach row"))?
        {
            coaches.push(row_to_coach(&row)?);
        }
        Ok(coaches)
    }

    async fn query_steps(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Step>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(query_err("Failed to query steps"))?;

        let mut steps = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(query_err("Failed to read step row"))?
        {
            steps.push(row_to_step(&row)?);
        }
        Ok(steps)
    }
}

fn rate_value(rate: Option<Decimal>) -> libsql::Value {
    match rate {
        Some(r) => libsql::Value::Text(r.to_string()),
        None => libsql::Value::Null,
    }
}

fn specialties_json(profile: &CoachProfile) -> Result<String, DatabaseError> {
    serde_json::to_string(&profile.specialties)
        .map_err(|e| DatabaseError::Serialization(format!("Failed to encode specialties: {e}")))
}

/// Write a coach, its steps, and its profile on `conn`.
async fn insert_coach_rows(
    conn: &Connection,
    coach: &Coach,
    steps: &[Step],
    profile: &CoachProfile,
) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO coaches ({COACH_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            coach.id.to_string(),
            coach.name.clone(),
            coach.email.clone(),
            coach.onboarding_token.clone(),
            coach.status.as_str(),
            rate_value(coach.hourly_rate),
            coach.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(query_err("Failed to insert coach"))?;

    for step in steps {
        conn.execute(
            &format!(
                "INSERT INTO coach_steps ({STEP_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                step.coach_id.to_string(),
                step.key.as_str(),
                i64::from(step.completed),
                opt_datetime(step.completed_at),
                opt_text(step.file_path.as_deref()),
                opt_text(step.admin_file_path.as_deref()),
                step.review_status.as_str(),
                opt_text(step.review_feedback.as_deref()),
                opt_datetime(step.reviewed_at),
            ],
        )
        .await
        .map_err(query_err("Failed to insert step"))?;
    }

    conn.execute(
        &format!("INSERT INTO coach_profiles ({PROFILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            profile.coach_id.to_string(),
            opt_text(profile.bio.as_deref()),
            specialties_json(profile)?,
            opt_text(profile.credentials.as_deref()),
            opt_text(profile.linkedin_url.as_deref()),
            opt_text(profile.scheduling_preferences.as_deref()),
            profile.updated_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(query_err("Failed to insert profile"))?;
    Ok(())
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Coaches ─────────────────────────────────────────────────────

    async fn insert_coach(
        &self,
        coach: &Coach,
        steps: &[Step],
        profile: &CoachProfile,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(query_err("Failed to begin transaction"))?;

        if let Err(e) = insert_coach_rows(&tx, coach, steps, profile).await {
            if let Err(rb) = tx.rollback().await {
                warn!(coach_id = %coach.id, error = %rb, "Rollback failed");
            }
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(query_err("Failed to commit coach insert"))?;

        debug!(coach_id = %coach.id, steps = steps.len(), "Inserted coach");
        Ok(())
    }

    async fn get_coach(&self, id: Uuid) -> Result<Option<Coach>, DatabaseError> {
        let coaches = self
            .query_coaches(
                &format!("SELECT {COACH_COLUMNS} FROM coaches WHERE id = ?1"),
                params![id.to_string()],
            )
            .await?;
        Ok(coaches.into_iter().next())
    }

    async fn get_coach_by_token(&self, token: &str) -> Result<Option<Coach>, DatabaseError> {
        let coaches = self
            .query_coaches(
                &format!("SELECT {COACH_COLUMNS} FROM coaches WHERE onboarding_token = ?1"),
                params![token],
            )
            .await?;
        Ok(coaches.into_iter().next())
    }

    async fn list_coaches(&self) -> Result<Vec<Coach>, DatabaseError> {
        self.query_coaches(
            &format!("SELECT {COACH_COLUMNS} FROM coaches ORDER BY created_at DESC"),
            (),
        )
        .await
    }

    async fn update_coach_status(&self, id: Uuid, status: CoachStatus) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let affected = self
            .conn()
            .execute(
                "UPDATE coaches SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id.to_string()],
            )
            .await
            .map_err(query_err("Failed to update coach status"))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "coach".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_coach_rate(&self, id: Uuid, rate: Option<Decimal>) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let affected = self
            .conn()
            .execute(
                "UPDATE coaches SET hourly_rate = ?1 WHERE id = ?2",
                params![rate_value(rate), id.to_string()],
            )
            .await
            .map_err(query_err("Failed to update hourly rate"))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "coach".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // ── Steps ───────────────────────────────────────────────────────

    async fn get_steps(&self, coach_id: Uuid) -> Result<Vec<Step>, DatabaseError> {
        self.query_steps(
            &format!("SELECT {STEP_COLUMNS} FROM coach_steps WHERE coach_id = ?1"),
            params![coach_id.to_string()],
        )
        .await
    }

    async fn get_step(&self, coach_id: Uuid, key: StepKey) -> Result<Option<Step>, DatabaseError> {
        let steps = self
            .query_steps(
                &format!("SELECT {STEP_COLUMNS} FROM coach_steps WHERE coach_id = ?1 AND step_key = ?2"),
                params![coach_id.to_string(), key.as_str()],
            )
            .await?;
        Ok(steps.into_iter().next())
    }

    async fn update_step(&self, step: &Step) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let affected = self
            .conn()
            .execute(
                "UPDATE coach_steps SET completed = ?1, completed_at = ?2, file_path = ?3, admin_file_path = ?4, review_status = ?5, review_feedback = ?6, reviewed_at = ?7 WHERE coach_id = ?8 AND step_key = ?9",
                params![
                    i64::from(step.completed),
                    opt_datetime(step.completed_at),
                    opt_text(step.file_path.as_deref()),
                    opt_text(step.admin_file_path.as_deref()),
                    step.review_status.as_str(),
                    opt_text(step.review_feedback.as_deref()),
                    opt_datetime(step.reviewed_at),
                    step.coach_id.to_string(),
                    step.key.as_str(),
                ],
            )
            .await
            .map_err(query_err("Failed to update step"))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "step".into(),
                id: format!("{}/{}", step.coach_id, step.key),
            });
        }
        Ok(())
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, coach_id: Uuid) -> Result<Option<CoachProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM coach_profiles WHERE coach_id = ?1"),
                params![coach_id.to_string()],
            )
            .await
            .map_err(query_err("Failed to query profile"))?;

        match rows
            .next()
            .await
            .map_err(query_err("Failed to read profile row"))?
        {
            Some(row) => Ok(Some(row_to_profile(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_profile(&self, profile: &CoachProfile) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let affected = self
            .conn()
            .execute(
                "UPDATE coach_profiles SET bio = ?1, specialties = ?2, credentials = ?3, linkedin_url = ?4, scheduling_preferences = ?5, updated_at = ?6 WHERE coach_id = ?7",
                params![
                    opt_text(profile.bio.as_deref()),
                    specialties_json(profile)?,
                    opt_text(profile.credentials.as_deref()),
                    opt_text(profile.linkedin_url.as_deref()),
                    opt_text(profile.scheduling_preferences.as_deref()),
                    profile.updated_at.to_rfc3339(),
                    profile.coach_id.to_string(),
                ],
            )
            .await
            .map_err(query_err("Failed to update profile"))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "profile".into(),
                id: profile.coach_id.to_string(),
            });
        }
        Ok(())
    }
}
