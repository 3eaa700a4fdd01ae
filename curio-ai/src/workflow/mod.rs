//! Job orchestration
//!
//! [`JobRunner`] owns background execution: it creates the job row, runs the
//! analysis or curriculum pipeline on a spawned task, and is the only place
//! a job reaches a terminal state. Errors and panics inside a pipeline both
//! resolve to `failed`.

pub mod analysis;
pub mod curriculum;
pub mod job_runner;
pub mod reconcile;

pub use job_runner::{JobHandle, JobRunner, RunnerSettings, StartOptions};
pub use reconcile::{normalize_title, reconcile, MatchStrategy, ModuleResolution};

use crate::backends::BackendError;
use crate::models::FailureReason;
use crate::validators::ValidationError;
use thiserror::Error;
use uuid::Uuid;

/// Why a running job failed
#[derive(Debug, Error)]
pub enum JobError {
    #[error("no API key configured for backend '{backend}'")]
    NoCredential { backend: String },

    #[error("project snapshot contains no files")]
    NoFiles,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("model did not return a usable payload: {0}")]
    Validation(#[from] ValidationError),

    #[error("job exceeded its time limit of {seconds}s")]
    Timeout { seconds: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] curio_common::Error),

    #[error("job task panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            JobError::NoCredential { .. } => FailureReason::NoCredential,
            JobError::NoFiles => FailureReason::NoFiles,
            JobError::Backend(e) => e.failure_reason(),
            JobError::Validation(_) => FailureReason::MalformedResponse,
            JobError::Timeout { .. } => FailureReason::Timeout,
            JobError::Storage(_) | JobError::Panicked(_) => FailureReason::Internal,
        }
    }
}

/// Why a job could not be started
#[derive(Debug, Error)]
pub enum StartError {
    #[error("project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("project {0} already has an active job")]
    AlreadyActive(Uuid),

    #[error("project {0} has not been analyzed")]
    NotAnalyzed(Uuid),

    #[error("usage limit reached for owner '{0}'")]
    UsageDenied(String),

    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    #[error(transparent)]
    Storage(#[from] curio_common::Error),
}
