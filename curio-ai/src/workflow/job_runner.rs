//! Background job execution
//!
//! Lifecycle of one job:
//! 1. `start_*` inserts a `pending` row (rejected if the project already has
//!    an active job) and mirrors the project into `analyzing`/`generating`
//! 2. the spawned task runs pre-flight checks; a failure here is
//!    `pending -> failed`
//! 3. `pending -> processing`, then the pipeline runs under the job timeout
//! 4. results and `processing -> completed` commit in one transaction that
//!    writes nothing if the job already left `processing`; any error or panic
//!    is `processing -> failed`
//! 5. project status mirrors the outcome; enrichment runs last and never
//!    changes it

use super::analysis;
use super::curriculum::{self, CurriculumSettings};
use super::{JobError, StartError};
use crate::backends::{BackendProvider, GenerationBackend};
use crate::config::{CredentialStore, UsageGate};
use crate::db;
use crate::models::{
    CurriculumStatus, Hint, Job, JobKind, LearnerProfile, Project, ProjectStatus, TokenUsage,
};
use crate::services::{ModelResolver, TtlCache};
use chrono::Utc;
use curio_common::config::GenerationConfig;
use curio_common::events::{CurioEvent, EventBus};
use futures::FutureExt;
use sqlx::SqlitePool;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

const HINT_CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub default_backend: String,
    pub job_timeout: Duration,
    pub content_concurrency: usize,
    pub max_output_tokens: u32,
    pub hint_cache_ttl: Duration,
}

impl RunnerSettings {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            default_backend: config.default_backend.clone(),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            content_concurrency: config.effective_concurrency(),
            max_output_tokens: config.max_output_tokens,
            hint_cache_ttl: Duration::from_secs(config.model_cache_ttl_secs),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Options for starting a job
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Backend name; the configured default when absent
    pub backend: Option<String>,
    /// Replaces the built-in analysis instructions
    pub prompt_override: Option<String>,
    /// Curriculum personalization
    pub profile: LearnerProfile,
}

/// A started job and its background task
pub struct JobHandle {
    pub job: Job,
    pub task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    pool: SqlitePool,
    events: EventBus,
    credentials: Arc<dyn CredentialStore>,
    usage_gate: Arc<dyn UsageGate>,
    provider: Arc<dyn BackendProvider>,
    models: ModelResolver,
    hint_cache: TtlCache<String, Vec<Hint>>,
    settings: RunnerSettings,
}

impl JobRunner {
    pub fn new(
        pool: SqlitePool,
        events: EventBus,
        credentials: Arc<dyn CredentialStore>,
        usage_gate: Arc<dyn UsageGate>,
        provider: Arc<dyn BackendProvider>,
        models: ModelResolver,
        settings: RunnerSettings,
    ) -> Self {
        let capacity = NonZeroUsize::new(HINT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RunnerInner {
                hint_cache: TtlCache::new(capacity, settings.hint_cache_ttl),
                pool,
                events,
                credentials,
                usage_gate,
                provider,
                models,
                settings,
            }),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub async fn start_analysis(&self, project_id: Uuid, options: StartOptions) -> Result<JobHandle, StartError> {
        self.start(project_id, JobKind::Analysis, options).await
    }

    /// Requires a completed analysis
    pub async fn start_curriculum(&self, project_id: Uuid, options: StartOptions) -> Result<JobHandle, StartError> {
        self.start(project_id, JobKind::Curriculum, options).await
    }

    async fn start(&self, project_id: Uuid, kind: JobKind, options: StartOptions) -> Result<JobHandle, StartError> {
        let inner = &self.inner;
        let project = db::projects::load_project(&inner.pool, project_id)
            .await?
            .ok_or(StartError::ProjectNotFound(project_id))?;

        if kind == JobKind::Curriculum && project.status != ProjectStatus::Analyzed {
            return Err(StartError::NotAnalyzed(project_id));
        }

        if !inner.usage_gate.may_start(&project.owner).await? {
            return Err(StartError::UsageDenied(project.owner));
        }

        let backend_name = options
            .backend
            .clone()
            .unwrap_or_else(|| inner.settings.default_backend.clone());
        let model = inner
            .models
            .resolve(&backend_name)
            .await
            .map_err(|_| StartError::UnknownBackend(backend_name.clone()))?;

        let job = Job::new(project_id, kind, backend_name, model);
        if !db::jobs::create_job(&inner.pool, &job).await? {
            return Err(StartError::AlreadyActive(project_id));
        }

        let mirrored = match kind {
            JobKind::Analysis => {
                db::projects::set_status(&inner.pool, project_id, ProjectStatus::Analyzing).await
            }
            JobKind::Curriculum => {
                db::projects::set_curriculum_status(&inner.pool, project_id, CurriculumStatus::Generating)
                    .await
            }
        };
        if let Err(e) = mirrored {
            // No task will pick this row up
            let recorded = JobError::Storage(curio_common::Error::Internal(e.to_string()));
            self.finish_failed(&job, &recorded, TokenUsage::default()).await;
            return Err(StartError::Storage(e));
        }

        info!(
            job_id = %job.id,
            project_id = %project_id,
            kind = kind.as_str(),
            backend = %job.backend_name,
            model = %job.model_name,
            "Job queued"
        );
        inner.events.emit_lossy(CurioEvent::JobQueued {
            job_id: job.id,
            project_id,
            kind: kind.as_str().to_string(),
            timestamp: Utc::now(),
        });

        let runner = self.clone();
        let task_job = job.clone();
        let task = tokio::spawn(async move {
            runner.run(task_job, project, options).await;
        });

        Ok(JobHandle { job, task })
    }

    /// Failure boundary: every path out of here leaves the job terminal
    async fn run(&self, job: Job, project: Project, options: StartOptions) {
        let inner = &self.inner;

        let backend = match self.preflight(&job, &project).await {
            Ok(backend) => backend,
            Err(e) => {
                self.finish_failed(&job, &e, TokenUsage::default()).await;
                return;
            }
        };

        match db::jobs::mark_processing(&inner.pool, job.id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %job.id, "Job no longer pending (force-failed?); not starting");
                return;
            }
            Err(e) => {
                self.finish_failed(&job, &JobError::Storage(e), TokenUsage::default()).await;
                return;
            }
        }
        info!(job_id = %job.id, project_id = %job.project_id, "Job started");
        inner.events.emit_lossy(CurioEvent::JobStarted {
            job_id: job.id,
            project_id: job.project_id,
            timestamp: Utc::now(),
        });

        let timeout = inner.settings.job_timeout;
        let pipeline = AssertUnwindSafe(self.execute(&job, &project, backend.as_ref(), &options)).catch_unwind();

        let result = match tokio::time::timeout(timeout, pipeline).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(JobError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(JobError::Timeout {
                seconds: timeout.as_secs(),
            }),
        };

        match result {
            Ok(committed) => {
                if let Some(enrichment) = committed {
                    analysis::enrich(
                        &inner.pool,
                        &inner.events,
                        backend.as_ref(),
                        &job,
                        &project.name,
                        &enrichment.technologies,
                        &enrichment.new_names,
                    )
                    .await;
                }
            }
            Err(e) => self.finish_failed(&job, &e, TokenUsage::default()).await,
        }
    }

    /// Credential and input checks before the job leaves `pending`
    async fn preflight(&self, job: &Job, project: &Project) -> Result<Arc<dyn GenerationBackend>, JobError> {
        let inner = &self.inner;

        let api_key = inner
            .credentials
            .api_key(&project.owner, &job.backend_name)
            .await?
            .ok_or_else(|| JobError::NoCredential {
                backend: job.backend_name.clone(),
            })?;

        let file_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_files WHERE project_id = ?")
            .bind(job.project_id.to_string())
            .fetch_one(&inner.pool)
            .await
            .map_err(curio_common::Error::from)?;
        if file_count == 0 {
            return Err(JobError::NoFiles);
        }

        Ok(inner.provider.create(&job.backend_name, &api_key, &job.model_name)?)
    }

    /// Runs the pipeline and commits its results
    ///
    /// Returns enrichment work for a completed analysis.
    async fn execute(
        &self,
        job: &Job,
        project: &Project,
        backend: &dyn GenerationBackend,
        options: &StartOptions,
    ) -> Result<Option<PendingEnrichment>, JobError> {
        let inner = &self.inner;
        let snapshot = db::snapshots::load_snapshot(&inner.pool, job.project_id).await?;

        match job.kind {
            JobKind::Analysis => {
                let result = analysis::run_analysis(
                    &inner.pool,
                    &inner.hint_cache,
                    backend,
                    job.project_id,
                    &snapshot,
                    options.prompt_override.as_deref(),
                )
                .await?;

                let Some(new_names) = db::jobs::commit_analysis(
                    &inner.pool,
                    job,
                    result.usage,
                    &result.technologies,
                    &result.summary,
                )
                .await?
                else {
                    warn!(job_id = %job.id, "Job was no longer processing; analysis results discarded");
                    return Ok(None);
                };
                self.announce_completed(job, result.usage);

                info!(
                    job_id = %job.id,
                    technologies = result.technologies.len(),
                    new = new_names.len(),
                    "Analysis committed"
                );

                Ok(Some(PendingEnrichment {
                    technologies: result.technologies,
                    new_names,
                }))
            }
            JobKind::Curriculum => {
                let technologies = db::technologies::list_technologies(&inner.pool, job.project_id).await?;
                let outcome = curriculum::run_curriculum(
                    backend,
                    project,
                    &technologies,
                    &snapshot,
                    &options.profile,
                    CurriculumSettings {
                        max_output_tokens: inner.settings.max_output_tokens,
                        concurrency: inner.settings.content_concurrency,
                    },
                )
                .await?;

                if !db::jobs::commit_curriculum(&inner.pool, job, outcome.usage, &outcome.structure, &outcome.modules)
                    .await?
                {
                    warn!(job_id = %job.id, "Job was no longer processing; curriculum discarded");
                    return Ok(None);
                }

                for title in &outcome.missing {
                    inner.events.emit_lossy(CurioEvent::ModuleContentMissing {
                        job_id: job.id,
                        project_id: job.project_id,
                        module_title: title.clone(),
                        timestamp: Utc::now(),
                    });
                }
                self.announce_completed(job, outcome.usage);

                info!(
                    job_id = %job.id,
                    modules = outcome.modules.len(),
                    missing = outcome.missing.len(),
                    "Curriculum committed"
                );
                Ok(None)
            }
        }
    }

    fn announce_completed(&self, job: &Job, usage: TokenUsage) {
        info!(
            job_id = %job.id,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Job completed"
        );
        self.inner.events.emit_lossy(CurioEvent::JobCompleted {
            job_id: job.id,
            project_id: job.project_id,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            timestamp: Utc::now(),
        });
    }

    async fn finish_failed(&self, job: &Job, err: &JobError, usage: TokenUsage) {
        let inner = &self.inner;
        let reason = err.failure_reason();
        let message = err.to_string();

        match db::jobs::mark_failed(&inner.pool, job.id, reason, &message, usage).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %job.id, error = %message, "Job already terminal; failure not recorded");
                return;
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to record job failure");
                return;
            }
        }

        error!(job_id = %job.id, reason = reason.as_str(), error = %message, "Job failed");
        mirror_failure(&inner.pool, job).await;
        inner.events.emit_lossy(CurioEvent::JobFailed {
            job_id: job.id,
            project_id: job.project_id,
            reason: reason.as_str().to_string(),
            message,
            timestamp: Utc::now(),
        });
    }

    /// Operator escape hatch for a stuck job
    ///
    /// Returns `Ok(false)` when the job was already terminal.
    pub async fn force_fail(&self, job_id: Uuid, reason: &str) -> curio_common::Result<bool> {
        let inner = &self.inner;
        let job = db::jobs::load_job(&inner.pool, job_id)
            .await?
            .ok_or_else(|| curio_common::Error::NotFound(format!("job {}", job_id)))?;

        let message = format!("force-failed: {}", reason);
        if !db::jobs::mark_failed(&inner.pool, job_id, crate::models::FailureReason::Internal, &message, job.usage)
            .await?
        {
            return Ok(false);
        }

        warn!(job_id = %job_id, reason, "Job force-failed");
        mirror_failure(&inner.pool, &job).await;
        inner.events.emit_lossy(CurioEvent::JobFailed {
            job_id,
            project_id: job.project_id,
            reason: crate::models::FailureReason::Internal.as_str().to_string(),
            message,
            timestamp: Utc::now(),
        });
        Ok(true)
    }

    /// Fail jobs a previous process left non-terminal
    pub async fn recover_interrupted(&self) -> curio_common::Result<usize> {
        let interrupted = db::jobs::fail_interrupted_jobs(&self.inner.pool).await?;
        for job in &interrupted {
            warn!(job_id = %job.id, project_id = %job.project_id, "Job interrupted by restart");
            mirror_failure(&self.inner.pool, job).await;
        }
        Ok(interrupted.len())
    }
}

struct PendingEnrichment {
    technologies: Vec<crate::models::Technology>,
    new_names: Vec<String>,
}

/// Mirror a failed job into its project's status field
async fn mirror_failure(pool: &SqlitePool, job: &Job) {
    let result = match job.kind {
        JobKind::Analysis => db::projects::set_status(pool, job.project_id, ProjectStatus::Error).await,
        JobKind::Curriculum => {
            db::projects::set_curriculum_status(pool, job.project_id, CurriculumStatus::Error).await
        }
    };
    if let Err(e) = result {
        error!(job_id = %job.id, error = %e, "Failed to mirror job failure to project");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
