//! Technology records and their closed enums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Technology category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechCategory {
    Language,
    Framework,
    Library,
    Database,
    Orm,
    Styling,
    Testing,
    BuildTool,
    Infrastructure,
    Service,
    Other,
}

impl TechCategory {
    pub const ALL: [TechCategory; 11] = [
        TechCategory::Language,
        TechCategory::Framework,
        TechCategory::Library,
        TechCategory::Database,
        TechCategory::Orm,
        TechCategory::Styling,
        TechCategory::Testing,
        TechCategory::BuildTool,
        TechCategory::Infrastructure,
        TechCategory::Service,
        TechCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TechCategory::Language => "language",
            TechCategory::Framework => "framework",
            TechCategory::Library => "library",
            TechCategory::Database => "database",
            TechCategory::Orm => "orm",
            TechCategory::Styling => "styling",
            TechCategory::Testing => "testing",
            TechCategory::BuildTool => "build_tool",
            TechCategory::Infrastructure => "infrastructure",
            TechCategory::Service => "service",
            TechCategory::Other => "other",
        }
    }

    /// Lenient parse: case, spaces and hyphens are ignored
    pub fn parse(value: &str) -> Option<Self> {
        let key = enum_key(value);
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

/// Role of a technology within the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Core,
    Supporting,
    Peripheral,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Core => "core",
            Importance::Supporting => "supporting",
            Importance::Peripheral => "peripheral",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match enum_key(value).as_str() {
            "core" => Some(Importance::Core),
            "supporting" => Some(Importance::Supporting),
            "peripheral" => Some(Importance::Peripheral),
            _ => None,
        }
    }
}

fn enum_key(value: &str) -> String {
    value
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

/// Uniqueness key of a technology name within a project
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Validated technology, ready for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technology {
    pub name: String,
    pub category: TechCategory,
    pub version: Option<String>,
    /// Always within `[0, 1]`
    pub confidence: f64,
    pub importance: Importance,
    #[serde(default)]
    pub description: String,
    /// Names of related technologies
    #[serde(default)]
    pub relationships: Vec<String>,
}

/// Persisted technology row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(flatten)]
    pub technology: Technology,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_lenient() {
        assert_eq!(TechCategory::parse("Build Tool"), Some(TechCategory::BuildTool));
        assert_eq!(TechCategory::parse("build-tool"), Some(TechCategory::BuildTool));
        assert_eq!(TechCategory::parse(" ORM "), Some(TechCategory::Orm));
        assert_eq!(TechCategory::parse("runtime"), None);
    }

    #[test]
    fn test_category_serde_matches_as_str() {
        for category in TechCategory::ALL {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, category.as_str());
        }
    }

    #[test]
    fn test_importance_parse() {
        assert_eq!(Importance::parse("CORE"), Some(Importance::Core));
        assert_eq!(Importance::parse("critical"), None);
    }

    #[test]
    fn test_name_key() {
        assert_eq!(name_key("  Next.js "), "next.js");
    }
}
