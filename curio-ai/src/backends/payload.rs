//! Structured payload extraction from free-text replies
//!
//! Replies are untrusted text that should carry one JSON payload. Cleaning
//! strips fenced-block wrapping and any leading or trailing prose; a reply
//! that still does not parse is a [`BackendError::MalformedPayload`].

use super::BackendError;
use serde_json::Value;

/// Best-effort extraction of the payload text
pub fn clean_payload(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(inner) = fenced_block(trimmed) {
        return inner;
    }

    bracketed(trimmed).unwrap_or(trimmed)
}

/// Parse a reply into JSON, trying the raw text before the cleaned text
pub fn parse_payload(text: &str) -> Result<Value, BackendError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BackendError::MalformedPayload("empty reply".to_string()));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let cleaned = clean_payload(trimmed);
    serde_json::from_str::<Value>(cleaned).or_else(|first_err| {
        // A fenced block may itself carry prose around the object
        match bracketed(cleaned) {
            Some(inner) if inner != cleaned => serde_json::from_str::<Value>(inner)
                .map_err(|e| BackendError::MalformedPayload(e.to_string())),
            _ => Err(BackendError::MalformedPayload(first_err.to_string())),
        }
    })
}

/// Content of the first fenced block whose body looks like JSON
fn fenced_block(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        let after_fence = &rest[start + 3..];
        // Skip the info string (`json`, `JSON`, ...)
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        let end = body.find("```")?;
        let inner = body[..end].trim();
        if inner.starts_with('{') || inner.starts_with('[') {
            return Some(inner);
        }
        rest = &body[end + 3..];
    }
    None
}

/// Slice from the first `{`/`[` to the last matching closer
fn bracketed(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}
