//! Deterministic technology hints

use super::technology::TechCategory;
use serde::{Deserialize, Serialize};

/// Hints are low-confidence signals; no hint may claim more than this
pub const HINT_CONFIDENCE_CAP: f64 = 0.6;

/// Technology signal derived from static rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub name: String,
    pub category: TechCategory,
    pub version: Option<String>,
    pub confidence: f64,
    /// Where the signal came from (`package.json`, `extension:.ts`, ...)
    pub source: String,
}

impl Hint {
    pub fn new(
        name: impl Into<String>,
        category: TechCategory,
        version: Option<String>,
        confidence: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            version,
            confidence: confidence.clamp(0.0, HINT_CONFIDENCE_CAP),
            source: source.into(),
        }
    }
}
