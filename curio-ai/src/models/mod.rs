//! Data models for curio-ai

pub mod curriculum;
pub mod digest;
pub mod hint;
pub mod job;
pub mod project;
pub mod snapshot;
pub mod technology;

pub use curriculum::{
    ContentBatchItem, ContentSection, CurriculumStructure, ExperienceLevel, LearnerProfile,
    LearningModule, MatchTier, OutlineModule,
};
pub use digest::{
    ConfigSummary, Dependency, Digest, ImportEdge, ImportKind, InstructionExcerpt, Route,
    RouteType,
};
pub use hint::{Hint, HINT_CONFIDENCE_CAP};
pub use job::{
    FailureReason, InvalidTransition, Job, JobKind, JobStatus, JobStatusView, StateTransition,
    TokenUsage,
};
pub use project::{CurriculumStatus, Project, ProjectStatus};
pub use snapshot::{Snapshot, SnapshotFile};
pub use technology::{name_key, Importance, TechCategory, Technology, TechnologyRecord};
