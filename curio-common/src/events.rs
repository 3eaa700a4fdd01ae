//! Job lifecycle events
//!
//! In-process broadcast of job lifecycle changes. Status is still polled from
//! the database; these events are observability hooks for logging bridges,
//! metrics exporters and tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle event emitted by the job orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CurioEvent {
    /// Job row created in `pending`
    JobQueued {
        job_id: Uuid,
        project_id: Uuid,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// Job moved to `processing`
    JobStarted {
        job_id: Uuid,
        project_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Job reached `completed`
    JobCompleted {
        job_id: Uuid,
        project_id: Uuid,
        input_tokens: u64,
        output_tokens: u64,
        timestamp: DateTime<Utc>,
    },

    /// Job reached `failed`
    JobFailed {
        job_id: Uuid,
        project_id: Uuid,
        reason: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A learning module was persisted without content
    ModuleContentMissing {
        job_id: Uuid,
        project_id: Uuid,
        module_title: String,
        timestamp: DateTime<Utc>,
    },

    /// Post-completion enrichment failed (job outcome unaffected)
    EnrichmentFailed {
        job_id: Uuid,
        project_id: Uuid,
        technology: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl CurioEvent {
    /// Job this event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            CurioEvent::JobQueued { job_id, .. }
            | CurioEvent::JobStarted { job_id, .. }
            | CurioEvent::JobCompleted { job_id, .. }
            | CurioEvent::JobFailed { job_id, .. }
            | CurioEvent::ModuleContentMissing { job_id, .. }
            | CurioEvent::EnrichmentFailed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast bus for [`CurioEvent`]s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CurioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CurioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning the subscriber count
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: CurioEvent) -> Result<usize, broadcast::error::SendError<CurioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CurioEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
