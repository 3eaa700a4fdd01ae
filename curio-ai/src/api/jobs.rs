//! Job status API handlers
//!
//! GET /jobs/:id, POST /jobs/:id/fail

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db,
    error::{ApiError, ApiResult},
    models::JobStatusView,
    AppState,
};

/// POST /jobs/:id/fail request
#[derive(Debug, Deserialize)]
pub struct ForceFailRequest {
    pub reason: String,
}

/// GET /jobs/:id
///
/// Polled status surface. Readers treat it as eventually consistent.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusView>> {
    let job = db::jobs::load_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;

    Ok(Json(job.status_view()))
}

/// POST /jobs/:id/fail
///
/// Force-mark a stuck job `failed`. 409 if the job is already terminal.
pub async fn force_fail_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<ForceFailRequest>,
) -> ApiResult<Json<JobStatusView>> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("A reason is required".to_string()));
    }

    if !state.runner.force_fail(job_id, request.reason.trim()).await? {
        return Err(ApiError::Conflict(format!("Job {} is already terminal", job_id)));
    }

    let job = db::jobs::load_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;
    Ok(Json(job.status_view()))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/fail", post(force_fail_job))
}
