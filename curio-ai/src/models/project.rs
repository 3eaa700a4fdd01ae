//! Project and its mirrored status fields

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analysis status mirrored from the latest analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Analyzing,
    Analyzed,
    Error,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::Analyzing => "analyzing",
            ProjectStatus::Analyzed => "analyzed",
            ProjectStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ProjectStatus::Pending),
            "analyzing" => Some(ProjectStatus::Analyzing),
            "analyzed" => Some(ProjectStatus::Analyzed),
            "error" => Some(ProjectStatus::Error),
            _ => None,
        }
    }
}

/// Curriculum status mirrored from the latest curriculum job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurriculumStatus {
    None,
    Generating,
    Ready,
    Error,
}

impl CurriculumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurriculumStatus::None => "none",
            CurriculumStatus::Generating => "generating",
            CurriculumStatus::Ready => "ready",
            CurriculumStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(CurriculumStatus::None),
            "generating" => Some(CurriculumStatus::Generating),
            "ready" => Some(CurriculumStatus::Ready),
            "error" => Some(CurriculumStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub status: ProjectStatus,
    pub curriculum_status: CurriculumStatus,
    pub architecture_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            status: ProjectStatus::Pending,
            curriculum_status: CurriculumStatus::None,
            architecture_summary: None,
            created_at: now,
            updated_at: now,
        }
    }
}
