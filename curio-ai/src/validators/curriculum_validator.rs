//! Curriculum outline and content validation

use super::{json_type_name, non_blank, string_list, ValidationError};
use crate::models::{ContentBatchItem, ContentSection, CurriculumStructure, OutlineModule};
use serde_json::Value;
use tracing::warn;

const DEFAULT_MODULE_TYPE: &str = "concept";

/// Phase-1 outline
///
/// Modules without a title are dropped. Zero usable modules is an error.
pub fn validate_outline(payload: &Value) -> Result<CurriculumStructure, ValidationError> {
    let modules_value = match payload {
        Value::Object(_) => payload.get("modules").and_then(Value::as_array),
        Value::Array(items) => Some(items),
        other => {
            return Err(ValidationError::UnexpectedShape {
                expected: "object or array",
                actual: json_type_name(other),
            })
        }
    };

    let raw = modules_value.map(Vec::as_slice).unwrap_or_default();
    let modules: Vec<OutlineModule> = raw.iter().filter_map(outline_module).collect();

    if modules.len() < raw.len() {
        warn!(
            dropped = raw.len() - modules.len(),
            kept = modules.len(),
            "Dropped untitled outline modules"
        );
    }
    if modules.is_empty() {
        return Err(ValidationError::EmptyOutline);
    }

    Ok(CurriculumStructure {
        title: non_blank(payload, "title").unwrap_or("Project curriculum").to_string(),
        description: non_blank(payload, "description").unwrap_or_default().to_string(),
        difficulty: non_blank(payload, "difficulty").unwrap_or("intermediate").to_string(),
        estimated_hours: payload
            .get("estimated_hours")
            .and_then(Value::as_f64)
            .filter(|h| h.is_finite() && *h > 0.0),
        modules,
    })
}

fn outline_module(value: &Value) -> Option<OutlineModule> {
    let title = non_blank(value, "title")?;

    Some(OutlineModule {
        title: title.to_string(),
        description: non_blank(value, "description").unwrap_or_default().to_string(),
        module_type: non_blank(value, "type")
            .or_else(|| non_blank(value, "module_type"))
            .unwrap_or(DEFAULT_MODULE_TYPE)
            .to_string(),
        tech_binding: non_blank(value, "tech_binding")
            .or_else(|| non_blank(value, "technology"))
            .unwrap_or_default()
            .to_string(),
        relevant_files: string_list(value, "relevant_files"),
        objectives: string_list(value, "objectives"),
        estimated_minutes: value
            .get("estimated_minutes")
            .and_then(Value::as_u64)
            .filter(|m| *m > 0)
            .and_then(|m| u32::try_from(m).ok()),
    })
}

/// Phase-2 items
///
/// Items are kept even without a title so positional pairing still sees
/// them. A payload of the wrong shape counts as zero items.
pub fn validate_content_items(payload: &Value) -> Vec<ContentBatchItem> {
    let items = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => ["modules", "items"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or_else(|| std::slice::from_ref(payload)),
        other => {
            warn!(shape = json_type_name(other), "Content payload is not an array; treating as zero items");
            return Vec::new();
        }
    };

    items.iter().filter(|v| v.is_object()).map(content_item).collect()
}

fn content_item(value: &Value) -> ContentBatchItem {
    let module_title = non_blank(value, "module_title")
        .or_else(|| non_blank(value, "title"))
        .map(str::to_string);

    let sections = match value.get("content").or_else(|| value.get("sections")) {
        Some(Value::String(text)) if !text.trim().is_empty() => vec![ContentSection::text(text.trim())],
        Some(Value::Array(blocks)) => blocks.iter().filter_map(section).collect(),
        _ => Vec::new(),
    };

    ContentBatchItem {
        module_title,
        sections,
    }
}

fn section(value: &Value) -> Option<ContentSection> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(ContentSection::text(text.trim())),
        Value::Object(_) => {
            let content = non_blank(value, "content").or_else(|| non_blank(value, "text"))?;
            Some(ContentSection {
                section_type: non_blank(value, "type").unwrap_or("text").to_string(),
                title: non_blank(value, "title").map(str::to_string),
                content: content.to_string(),
                language: non_blank(value, "language").map(str::to_string),
            })
        }
        _ => None,
    }
}
