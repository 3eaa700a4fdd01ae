//! Result validation layer
//!
//! Maps untrusted generative output into domain records. Each entry is
//! validated independently so one malformed entry never invalidates the rest
//! of its batch.
//!
//! # Validators
//! 1. **technology_validator** - technology lists and architecture summaries
//! 2. **curriculum_validator** - Phase-1 outlines and Phase-2 content items

pub mod curriculum_validator;
pub mod technology_validator;

pub use curriculum_validator::{validate_content_items, validate_outline};
pub use technology_validator::{validate_analysis, ValidatedAnalysis, DEFAULT_ARCHITECTURE_SUMMARY};

use thiserror::Error;

/// Payload-level validation failures
///
/// Entry-level problems never surface here; they drop or coerce the entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected {expected}, got {actual}")]
    UnexpectedShape {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("outline contains no usable modules")]
    EmptyOutline,
}

pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Non-blank trimmed string field
pub(crate) fn non_blank<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// String array field, ignoring non-string and blank members
pub(crate) fn string_list(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
