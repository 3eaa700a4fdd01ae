//! Technology list validation
//!
//! Accepted payloads: an object carrying `technologies` (plus an optional
//! `architecture_summary` or `summary`), or a bare array of entries.
//!
//! Per-entry rules:
//! - missing or blank `name` drops the entry (no placeholder names)
//! - unknown or missing `category` becomes `other`
//! - unknown or missing `importance` becomes `supporting`
//! - `confidence` is clamped to `[0, 1]`; missing or non-numeric is `0.5`
//! - duplicate names (case-insensitive) keep the first occurrence

use super::{json_type_name, non_blank, string_list, ValidationError};
use crate::models::{name_key, Importance, TechCategory, Technology};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const DEFAULT_ARCHITECTURE_SUMMARY: &str =
    "Architecture summary unavailable: the analysis did not describe the project structure.";

const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnalysis {
    pub technologies: Vec<Technology>,
    pub summary: String,
    /// Entries dropped for lacking a usable name
    pub dropped: usize,
}

pub fn validate_analysis(payload: &Value) -> Result<ValidatedAnalysis, ValidationError> {
    let (entries, summary) = match payload {
        Value::Object(map) => {
            let entries = map.get("technologies").and_then(Value::as_array);
            let summary = ["architecture_summary", "summary"]
                .iter()
                .find_map(|key| non_blank(payload, key));
            (entries.map(Vec::as_slice).unwrap_or_default(), summary)
        }
        Value::Array(items) => (items.as_slice(), None),
        other => {
            return Err(ValidationError::UnexpectedShape {
                expected: "object or array",
                actual: json_type_name(other),
            })
        }
    };

    let mut seen = HashSet::new();
    let mut technologies = Vec::with_capacity(entries.len());
    let mut dropped = 0;

    for entry in entries {
        let Some(technology) = validate_entry(entry) else {
            dropped += 1;
            continue;
        };
        if !seen.insert(name_key(&technology.name)) {
            debug!(name = %technology.name, "Dropping duplicate technology entry");
            continue;
        }
        technologies.push(technology);
    }

    if dropped > 0 {
        warn!(dropped, kept = technologies.len(), "Dropped technology entries without a usable name");
    }

    Ok(ValidatedAnalysis {
        technologies,
        summary: summary
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_ARCHITECTURE_SUMMARY.to_string()),
        dropped,
    })
}

/// One entry, or `None` when it has no usable name
pub fn validate_entry(entry: &Value) -> Option<Technology> {
    let name = non_blank(entry, "name")?;

    let category = entry
        .get("category")
        .and_then(Value::as_str)
        .and_then(TechCategory::parse)
        .unwrap_or(TechCategory::Other);

    let importance = entry
        .get("importance")
        .and_then(Value::as_str)
        .and_then(Importance::parse)
        .unwrap_or(Importance::Supporting);

    let confidence = entry
        .get("confidence")
        .and_then(numeric)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE);

    let version = match entry.get("version") {
        Some(Value::String(v)) if !v.trim().is_empty() => Some(v.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    Some(Technology {
        name: name.to_string(),
        category,
        version,
        confidence,
        importance,
        description: non_blank(entry, "description").unwrap_or_default().to_string(),
        relationships: string_list(entry, "relationships"),
    })
}

/// Numbers, and numeric strings such as `"0.8"`
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
