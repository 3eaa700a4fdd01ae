//! Anthropic Messages API adapter

use super::http::{credential_header, token_count, BackendSettings, HttpTransport, SharedRateLimiter};
use super::{BackendError, ChatRole, CompletionRequest, CompletionResponse, GenerationBackend};
use crate::models::TokenUsage;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};

const BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
pub const NAME: &str = "anthropic";

pub struct AnthropicBackend {
    transport: HttpTransport,
    settings: BackendSettings,
}

impl AnthropicBackend {
    pub fn new(settings: BackendSettings, rate_limiter: SharedRateLimiter) -> Result<Self, BackendError> {
        Ok(Self {
            transport: HttpTransport::new(NAME, &settings, rate_limiter)?,
            settings,
        })
    }

    fn headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let key = credential_header(NAME, &self.settings.api_key)?;
        headers.insert("x-api-key", key);
        Ok(headers)
    }
}

pub(crate) fn request_body(model: &str, request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            json!({
                "role": match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                "content": m.content,
            })
        })
        .collect();

    let mut body = json!({
        "model": model,
        "max_tokens": request.max_tokens,
        "messages": messages,
    });
    if let Some(system) = &request.system {
        body["system"] = Value::String(system.clone());
    }
    body
}

/// First `text` block plus usage
pub(crate) fn parse_response(value: &Value) -> Result<CompletionResponse, BackendError> {
    let text = value
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .find_map(|b| b.get("text").and_then(Value::as_str))
        })
        .ok_or_else(|| BackendError::EmptyResponse {
            backend: NAME.to_string(),
        })?;

    Ok(CompletionResponse {
        text: text.to_string(),
        usage: TokenUsage::new(
            token_count(value, "/usage/input_tokens"),
            token_count(value, "/usage/output_tokens"),
        ),
    })
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, BackendError> {
        let base = self.settings.base_url.as_deref().unwrap_or(BASE_URL);
        let url = format!("{}/v1/messages", base.trim_end_matches('/'));
        let body = request_body(&self.settings.model, &request);
        let reply = self.transport.post_json(&url, self.headers()?, &body).await?;
        parse_response(&reply)
    }
}
