//! Job state machine
//!
//! `pending → processing → {completed | failed}`; `pending → failed` is
//! allowed for pre-flight failures and force-fail. Terminal states accept no
//! further transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use thiserror::Error;
use uuid::Uuid;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// What a job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Analysis,
    Curriculum,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Analysis => "analysis",
            JobKind::Curriculum => "curriculum",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "analysis" => Some(JobKind::Analysis),
            "curriculum" => Some(JobKind::Curriculum),
            _ => None,
        }
    }
}

/// Persisted classification of a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NoCredential,
    NoFiles,
    BackendError,
    MalformedResponse,
    Timeout,
    Internal,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NoCredential => "no_credential",
            FailureReason::NoFiles => "no_files",
            FailureReason::BackendError => "backend_error",
            FailureReason::MalformedResponse => "malformed_response",
            FailureReason::Timeout => "timeout",
            FailureReason::Internal => "internal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "no_credential" => Some(FailureReason::NoCredential),
            "no_files" => Some(FailureReason::NoFiles),
            "backend_error" => Some(FailureReason::BackendError),
            "malformed_response" => Some(FailureReason::MalformedResponse),
            "timeout" => Some(FailureReason::Timeout),
            "internal" => Some(FailureReason::Internal),
            _ => None,
        }
    }
}

/// Token counts, summed across every call a job makes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// Rejected state transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid job transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Recorded state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Analysis or curriculum job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub project_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub backend_name: String,
    pub model_name: String,
    pub usage: TokenUsage,
    pub error_message: Option<String>,
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// New job in `pending`
    pub fn new(
        project_id: Uuid,
        kind: JobKind,
        backend_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            kind,
            status: JobStatus::Pending,
            backend_name: backend_name.into(),
            model_name: model_name.into(),
            usage: TokenUsage::default(),
            error_message: None,
            failure_reason: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a transition in memory, stamping start/end times
    pub fn transition_to(&mut self, next: JobStatus) -> Result<StateTransition, InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        let transition = StateTransition {
            job_id: self.id,
            old_status: self.status,
            new_status: next,
            transitioned_at: now,
        };
        self.status = next;

        match next {
            JobStatus::Processing => self.started_at = Some(now),
            JobStatus::Completed | JobStatus::Failed => self.completed_at = Some(now),
            JobStatus::Pending => {}
        }

        Ok(transition)
    }

    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id,
            project_id: self.project_id,
            kind: self.kind,
            status: self.status,
            backend_name: self.backend_name.clone(),
            model_name: self.model_name.clone(),
            error_message: self.error_message.clone(),
            failure_reason: self.failure_reason,
            token_counts: (!self.usage.is_zero()).then_some(self.usage),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Polled job-status surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub project_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub backend_name: String,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_counts: Option<TokenUsage>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    #[test]
    fn test_terminal_states_accept_nothing() {
        for terminal in [JobStatus::Completed, JobStatus::Failed] {
            for next in ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_happy_path_stamps_times() {
        let mut job = Job::new(Uuid::new_v4(), JobKind::Analysis, "anthropic", "m");
        job.transition_to(JobStatus::Processing).unwrap();
        assert!(job.started_at.is_some());

        let transition = job.transition_to(JobStatus::Completed).unwrap();
        assert_eq!(transition.old_status, JobStatus::Processing);
        assert!(job.completed_at.is_some());

        let err = job.transition_to(JobStatus::Failed).unwrap_err();
        assert_eq!(err.from, JobStatus::Completed);
    }

    #[test]
    fn test_pending_may_fail_directly_but_not_complete() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_string_round_trip() {
        for status in ALL {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FailureReason::parse("malformed_response"), Some(FailureReason::MalformedResponse));
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage += TokenUsage::new(10, 5);
        usage += TokenUsage::new(1, 2);
        assert_eq!(usage, TokenUsage::new(11, 7));
        assert_eq!(usage.total(), 18);
    }

    #[test]
    fn test_status_view_hides_zero_usage() {
        let job = Job::new(Uuid::new_v4(), JobKind::Curriculum, "openai", "m");
        let json = serde_json::to_value(job.status_view()).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("token_counts").is_none());
    }
}
