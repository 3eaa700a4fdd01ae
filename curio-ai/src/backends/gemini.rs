//! Google Gemini generateContent adapter

use super::http::{credential_header, token_count, BackendSettings, HttpTransport, SharedRateLimiter};
use super::{BackendError, ChatRole, CompletionRequest, CompletionResponse, GenerationBackend};
use crate::models::TokenUsage;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const NAME: &str = "gemini";

pub struct GeminiBackend {
    transport: HttpTransport,
    settings: BackendSettings,
}

impl GeminiBackend {
    pub fn new(settings: BackendSettings, rate_limiter: SharedRateLimiter) -> Result<Self, BackendError> {
        Ok(Self {
            transport: HttpTransport::new(NAME, &settings, rate_limiter)?,
            settings,
        })
    }

    fn headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = credential_header(NAME, &self.settings.api_key)?;
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }
}

/// Assistant turns are `model` turns in this API
pub(crate) fn request_body(request: &CompletionRequest) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            json!({
                "role": match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                },
                "parts": [{"text": m.content}],
            })
        })
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": {"maxOutputTokens": request.max_tokens},
    });
    if let Some(system) = &request.system {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    body
}

pub(crate) fn parse_response(value: &Value) -> Result<CompletionResponse, BackendError> {
    let text = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .and_then(|parts| parts.iter().find_map(|p| p.get("text").and_then(Value::as_str)))
        .ok_or_else(|| BackendError::EmptyResponse {
            backend: NAME.to_string(),
        })?;

    Ok(CompletionResponse {
        text: text.to_string(),
        usage: TokenUsage::new(
            token_count(value, "/usageMetadata/promptTokenCount"),
            token_count(value, "/usageMetadata/candidatesTokenCount"),
        ),
    })
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, BackendError> {
        let base = self.settings.base_url.as_deref().unwrap_or(BASE_URL);
        let url = format!(
            "{}/models/{}:generateContent",
            base.trim_end_matches('/'),
            self.settings.model
        );
        let body = request_body(&request);
        let reply = self.transport.post_json(&url, self.headers()?, &body).await?;
        parse_response(&reply)
    }
}
