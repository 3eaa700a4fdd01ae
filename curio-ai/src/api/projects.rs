//! Project API handlers
//!
//! POST /projects, GET /projects/:id (+ digest, technologies, modules),
//! POST /projects/:id/analysis, POST /projects/:id/curriculum

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    db,
    error::{ApiError, ApiResult},
    models::{
        CurriculumStatus, CurriculumStructure, JobKind, JobStatus, JobStatusView, LearnerProfile,
        LearningModule, Project, ProjectStatus, Snapshot, SnapshotFile, TechnologyRecord,
    },
    workflow::{analysis, StartOptions},
    AppState,
};

const DEFAULT_OWNER: &str = "local";

/// POST /projects request
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub files: Vec<SnapshotFile>,
}

/// GET /projects/:id response
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub project_id: Uuid,
    pub owner: String,
    pub name: String,
    pub status: ProjectStatus,
    pub curriculum_status: CurriculumStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture_summary: Option<String>,
    pub file_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_job: Option<JobStatusView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curriculum_job: Option<JobStatusView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// GET /projects/:id/digest response
#[derive(Debug, Serialize)]
pub struct DigestResponse {
    pub project_id: Uuid,
    pub fingerprint: String,
    pub digest: String,
}

/// GET /projects/:id/technologies response
#[derive(Debug, Serialize)]
pub struct TechnologiesResponse {
    pub project_id: Uuid,
    pub technologies: Vec<TechnologyRecord>,
    /// Reference notes by technology name
    pub reference_notes: BTreeMap<String, String>,
}

/// GET /projects/:id/modules response
#[derive(Debug, Serialize)]
pub struct ModulesResponse {
    pub project_id: Uuid,
    pub curriculum_status: CurriculumStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<CurriculumStructure>,
    pub modules: Vec<LearningModule>,
}

/// POST /projects/:id/analysis request
#[derive(Debug, Default, Deserialize)]
pub struct StartAnalysisRequest {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub prompt_override: Option<String>,
}

/// POST /projects/:id/curriculum request
#[derive(Debug, Default, Deserialize)]
pub struct StartCurriculumRequest {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub profile: LearnerProfile,
}

/// 202 response for a started job
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub project_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub backend: String,
    pub model: String,
}

/// POST /projects
///
/// Register a project with its snapshot. Returns 201 Created.
pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse>)> {
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Project name must not be empty".to_string()));
    }
    if let Some(file) = request.files.iter().find(|f| f.path.trim().is_empty()) {
        return Err(ApiError::BadRequest(format!(
            "Snapshot contains a file with an empty path (declared type '{}')",
            file.declared_type
        )));
    }

    let files: Vec<SnapshotFile> = request
        .files
        .into_iter()
        .map(|f| {
            if f.declared_type.is_empty() {
                SnapshotFile::new(f.path, f.content.as_deref())
            } else {
                f
            }
        })
        .collect();
    let snapshot = Snapshot::new(files);

    let owner = request
        .owner
        .filter(|o| !o.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OWNER.to_string());
    let project = Project::new(owner, request.name.trim());

    db::projects::insert_project(&state.db, &project).await?;
    db::snapshots::store_snapshot(&state.db, project.id, &snapshot).await?;

    tracing::info!(
        project_id = %project.id,
        files = snapshot.len(),
        fingerprint = %snapshot.fingerprint(),
        "Project registered"
    );

    let response = project_response(&state, project).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = db::projects::require_project(&state.db, project_id).await?;
    Ok(Json(project_response(&state, project).await?))
}

/// GET /projects/:id/digest
///
/// Served from the digest cache when the snapshot fingerprint matches.
pub async fn get_digest(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<DigestResponse>> {
    db::projects::require_project(&state.db, project_id).await?;
    let snapshot = db::snapshots::load_snapshot(&state.db, project_id).await?;
    let digest = analysis::load_or_build_digest(&state.db, project_id, &snapshot).await?;

    Ok(Json(DigestResponse {
        project_id,
        fingerprint: snapshot.fingerprint().to_string(),
        digest,
    }))
}

/// GET /projects/:id/technologies
pub async fn get_technologies(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<TechnologiesResponse>> {
    db::projects::require_project(&state.db, project_id).await?;
    let technologies = db::technologies::list_technologies(&state.db, project_id).await?;
    let reference_notes = db::knowledge::list_knowledge(&state.db, project_id)
        .await?
        .into_iter()
        .collect();

    Ok(Json(TechnologiesResponse {
        project_id,
        technologies,
        reference_notes,
    }))
}

/// GET /projects/:id/modules
pub async fn get_modules(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ModulesResponse>> {
    let project = db::projects::require_project(&state.db, project_id).await?;
    let structure = db::curricula::load_structure(&state.db, project_id).await?;
    let modules = db::curricula::list_modules(&state.db, project_id).await?;

    Ok(Json(ModulesResponse {
        project_id,
        curriculum_status: project.curriculum_status,
        structure,
        modules,
    }))
}

/// POST /projects/:id/analysis
///
/// Returns 202 Accepted with the job, 409 if a job is already active.
pub async fn start_analysis(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    request: Option<Json<StartAnalysisRequest>>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let handle = state
        .runner
        .start_analysis(
            project_id,
            StartOptions {
                backend: request.backend,
                prompt_override: request.prompt_override,
                profile: LearnerProfile::default(),
            },
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(accepted(&handle.job))))
}

/// POST /projects/:id/curriculum
///
/// Requires a completed analysis. Returns 202 Accepted, 409 if a job is
/// already active or the project is not analyzed.
pub async fn start_curriculum(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    request: Option<Json<StartCurriculumRequest>>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let handle = state
        .runner
        .start_curriculum(
            project_id,
            StartOptions {
                backend: request.backend,
                prompt_override: None,
                profile: request.profile,
            },
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(accepted(&handle.job))))
}

fn accepted(job: &crate::models::Job) -> JobAccepted {
    JobAccepted {
        job_id: job.id,
        project_id: job.project_id,
        kind: job.kind,
        status: job.status,
        backend: job.backend_name.clone(),
        model: job.model_name.clone(),
    }
}

async fn project_response(state: &AppState, project: Project) -> ApiResult<ProjectResponse> {
    let file_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_files WHERE project_id = ?")
        .bind(project.id.to_string())
        .fetch_one(&state.db)
        .await
        .map_err(curio_common::Error::from)?;

    let analysis_job = db::jobs::latest_job(&state.db, project.id, JobKind::Analysis).await?;
    let curriculum_job = db::jobs::latest_job(&state.db, project.id, JobKind::Curriculum).await?;

    Ok(ProjectResponse {
        project_id: project.id,
        owner: project.owner,
        name: project.name,
        status: project.status,
        curriculum_status: project.curriculum_status,
        architecture_summary: project.architecture_summary,
        file_count: file_count.max(0) as usize,
        analysis_job: analysis_job.map(|j| j.status_view()),
        curriculum_job: curriculum_job.map(|j| j.status_view()),
        created_at: project.created_at,
        updated_at: project.updated_at,
    })
}

/// Build project routes
pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project))
        .route("/projects/:id", get(get_project))
        .route("/projects/:id/digest", get(get_digest))
        .route("/projects/:id/technologies", get(get_technologies))
        .route("/projects/:id/modules", get(get_modules))
        .route("/projects/:id/analysis", post(start_analysis))
        .route("/projects/:id/curriculum", post(start_curriculum))
}
