//! Curriculum models
//!
//! Phase 1 produces a [`CurriculumStructure`]; Phase 2 produces transient
//! [`ContentBatchItem`]s; reconciliation merges both into durable
//! [`LearningModule`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Beginner => "beginner",
            ExperienceLevel::Intermediate => "intermediate",
            ExperienceLevel::Advanced => "advanced",
        }
    }
}

/// Learner profile supplied with a curriculum request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub focus_technologies: Vec<String>,
}

/// One Phase-1 outline module (no lesson content)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineModule {
    pub title: String,
    pub description: String,
    pub module_type: String,
    pub tech_binding: String,
    pub relevant_files: Vec<String>,
    pub objectives: Vec<String>,
    pub estimated_minutes: Option<u32>,
}

/// Phase-1 output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumStructure {
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub estimated_hours: Option<f64>,
    pub modules: Vec<OutlineModule>,
}

/// One block of lesson content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSection {
    /// `text`, `code`, `exercise`, ...
    #[serde(rename = "type")]
    pub section_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ContentSection {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            section_type: "text".to_string(),
            title: None,
            content: content.into(),
            language: None,
        }
    }
}

/// Phase-2 item, consumed immediately by reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBatchItem {
    pub module_title: Option<String>,
    pub sections: Vec<ContentSection>,
}

/// Reconciliation tier that resolved a module, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Exact,
    Normalized,
    Positional,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Normalized => "normalized",
            MatchTier::Positional => "positional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exact" => Some(MatchTier::Exact),
            "normalized" => Some(MatchTier::Normalized),
            "positional" => Some(MatchTier::Positional),
            _ => None,
        }
    }
}

/// Durable learning module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningModule {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Zero-based order within the curriculum
    pub position: u32,
    pub title: String,
    pub description: String,
    pub module_type: String,
    pub tech_binding: String,
    pub estimated_minutes: u32,
    /// Empty when no content item could be reconciled
    pub content: Vec<ContentSection>,
    pub resolution_tier: Option<MatchTier>,
    pub created_at: DateTime<Utc>,
}

impl LearningModule {
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}
