//! REST endpoints for the coach portal and the admin dashboard.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};
use uuid::Uuid;

use super::catalog::StepKey;
use super::model::{NewCoach, ProfileUpdate};
use super::service::OnboardingService;
use super::submission::{StoredFile, Upload};
use crate::error::{Error, ValidationError};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for portal routes.
#[derive(Clone)]
pub struct PortalState {
    pub service: Arc<OnboardingService>,
    /// Bearer token required on every `/api/admin` route.
    pub admin_token: Arc<SecretString>,
}

/// Build the full HTTP surface.
pub fn portal_routes(state: PortalState) -> Router {
    let admin = Router::new()
        .route("/api/admin/coaches", get(list_coaches).post(create_coach))
        .route("/api/admin/coaches/{id}", get(coach_detail))
        .route("/api/admin/coaches/{id}/rate", put(set_rate))
        .route("/api/admin/coaches/{id}/files", get(download_file))
        .route("/api/admin/coaches/{id}/steps/{key}/toggle", post(toggle_manual))
        .route("/api/admin/coaches/{id}/steps/{key}/approve", post(approve_step))
        .route(
            "/api/admin/coaches/{id}/steps/{key}/request-changes",
            post(request_changes),
        )
        .route("/api/admin/coaches/{id}/steps/{key}/contract", post(attach_contract))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .route("/onboard/{token}", get(portal))
        .route("/onboard/{token}/profile", put(save_profile))
        .route("/onboard/{token}/steps/{key}/upload", post(upload_artifact))
        .route("/onboard/{token}/steps/{key}/checkbox", post(set_checkbox))
        .route("/onboard/{token}/steps/{key}/contract", get(download_contract))
        .merge(admin)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Service(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Service(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Service(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Self::Service(Error::Validation(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Service(e @ Error::NotFound { .. }) => (StatusCode::NOT_FOUND, e.to_string()),
            Self::Service(e) => {
                error!(error = %e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_key(key: &str) -> Result<StepKey, ValidationError> {
    key.parse()
        .map_err(|_| ValidationError::UnknownStep(key.to_string()))
}

fn file_response(file: StoredFile) -> Response {
    ([(header::CONTENT_TYPE, file.content_type())], file.bytes).into_response()
}

fn declared_content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

// ── Auth ────────────────────────────────────────────────────────────────

/// Constant-time comparison of a presented bearer token.
fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

async fn require_admin(State(state): State<PortalState>, req: Request, next: Next) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token_matches(token, state.admin_token.expose_secret()));

    if authorized {
        next.run(req).await
    } else {
        warn!(path = %req.uri().path(), "Rejected admin request");
        ApiError::Unauthorized.into_response()
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "coach-onboard"
    }))
}

// ── Coach portal ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FileNameQuery {
    #[serde(default)]
    file_name: Option<String>,
}

impl FileNameQuery {
    fn into_upload(self, headers: &HeaderMap, body: Bytes) -> Upload {
        Upload::new(self.file_name.unwrap_or_default(), body.to_vec())
            .with_content_type(declared_content_type(headers))
    }
}

#[derive(Deserialize)]
struct CompletedRequest {
    completed: bool,
}

async fn portal(State(state): State<PortalState>, Path(token): Path<String>) -> ApiResult<Response> {
    let detail = state.service.portal(&token).await?;
    Ok(Json(detail).into_response())
}

async fn upload_artifact(
    State(state): State<PortalState>,
    Path((token, key)): Path<(String, String)>,
    Query(query): Query<FileNameQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let key = parse_key(&key)?;
    let outcome = state
        .service
        .submit_artifact(&token, key, query.into_upload(&headers, body))
        .await?;
    Ok(Json(outcome).into_response())
}

async fn save_profile(
    State(state): State<PortalState>,
    Path(token): Path<String>,
    Json(body): Json<ProfileUpdate>,
) -> ApiResult<Response> {
    let outcome = state.service.save_profile(&token, body).await?;
    Ok(Json(outcome).into_response())
}

async fn set_checkbox(
    State(state): State<PortalState>,
    Path((token, key)): Path<(String, String)>,
    Json(body): Json<CompletedRequest>,
) -> ApiResult<Response> {
    let key = parse_key(&key)?;
    let outcome = state
        .service
        .set_deck_reviewed(&token, key, body.completed)
        .await?;
    Ok(Json(outcome).into_response())
}

async fn download_contract(
    State(state): State<PortalState>,
    Path((token, key)): Path<(String, String)>,
) -> ApiResult<Response> {
    let key = parse_key(&key)?;
    let file = state.service.download_contract(&token, key).await?;
    Ok(file_response(file))
}

// ── Admin ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RateRequest {
    #[serde(default)]
    hourly_rate: Option<Decimal>,
}

#[derive(Deserialize)]
struct FeedbackRequest {
    #[serde(default)]
    feedback: String,
}

#[derive(Deserialize)]
struct FilePathQuery {
    path: String,
}

async fn list_coaches(State(state): State<PortalState>) -> ApiResult<Response> {
    let coaches = state.service.list_coaches().await?;
    Ok(Json(coaches).into_response())
}

async fn create_coach(
    State(state): State<PortalState>,
    Json(body): Json<NewCoach>,
) -> ApiResult<Response> {
    let outcome = state.service.create_coach(body).await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

async fn coach_detail(
    State(state): State<PortalState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let detail = state.service.coach_detail(id).await?;
    Ok(Json(detail).into_response())
}

async fn set_rate(
    State(state): State<PortalState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RateRequest>,
) -> ApiResult<Response> {
    let coach = state.service.set_hourly_rate(id, body.hourly_rate).await?;
    Ok(Json(coach).into_response())
}

async fn toggle_manual(
    State(state): State<PortalState>,
    Path((id, key)): Path<(Uuid, String)>,
    Json(body): Json<CompletedRequest>,
) -> ApiResult<Response> {
    let key = parse_key(&key)?;
    let outcome = state.service.toggle_manual(id, key, body.completed).await?;
    Ok(Json(outcome).into_response())
}

async fn approve_step(
    State(state): State<PortalState>,
    Path((id, key)): Path<(Uuid, String)>,
) -> ApiResult<Response> {
    let key = parse_key(&key)?;
    let outcome = state.service.approve(id, key).await?;
    Ok(Json(outcome).into_response())
}

async fn request_changes(
    State(state): State<PortalState>,
    Path((id, key)): Path<(Uuid, String)>,
    Json(body): Json<FeedbackRequest>,
) -> ApiResult<Response> {
    let key = parse_key(&key)?;
    let outcome = state
        .service
        .request_changes(id, key, body.feedback)
        .await?;
    Ok(Json(outcome).into_response())
}

async fn attach_contract(
    State(state): State<PortalState>,
    Path((id, key)): Path<(Uuid, String)>,
    Query(query): Query<FileNameQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let key = parse_key(&key)?;
    let outcome = state
        .service
        .attach_contract(id, key, query.into_upload(&headers, body))
        .await?;
    Ok(Json(outcome).into_response())
}

async fn download_file(
    State(state): State<PortalState>,
    Path(id): Path<Uuid>,
    Query(query): Query<FilePathQuery>,
) -> ApiResult<Response> {
    let file = state.service.download(id, &query.path).await?;
    Ok(file_response(file))
}
