//! OpenAI chat completions adapter

use super::http::{credential_header, token_count, BackendSettings, HttpTransport, SharedRateLimiter};
use super::{BackendError, ChatRole, CompletionRequest, CompletionResponse, GenerationBackend};
use crate::models::TokenUsage;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

const BASE_URL: &str = "https://api.openai.com/v1";
pub const NAME: &str = "openai";

pub struct OpenAiBackend {
    transport: HttpTransport,
    settings: BackendSettings,
}

impl OpenAiBackend {
    pub fn new(settings: BackendSettings, rate_limiter: SharedRateLimiter) -> Result<Self, BackendError> {
        Ok(Self {
            transport: HttpTransport::new(NAME, &settings, rate_limiter)?,
            settings,
        })
    }

    fn headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = credential_header(NAME, &format!("Bearer {}", self.settings.api_key))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

/// System prompt travels as the first message
pub(crate) fn request_body(model: &str, request: &CompletionRequest) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.extend(request.messages.iter().map(|m| {
        json!({
            "role": match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            "content": m.content,
        })
    }));

    json!({
        "model": model,
        "max_tokens": request.max_tokens,
        "messages": messages,
    })
}

pub(crate) fn parse_response(value: &Value) -> Result<CompletionResponse, BackendError> {
    let text = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| BackendError::EmptyResponse {
            backend: NAME.to_string(),
        })?;

    Ok(CompletionResponse {
        text: text.to_string(),
        usage: TokenUsage::new(
            token_count(value, "/usage/prompt_tokens"),
            token_count(value, "/usage/completion_tokens"),
        ),
    })
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, BackendError> {
        let base = self.settings.base_url.as_deref().unwrap_or(BASE_URL);
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        let body = request_body(&self.settings.model, &request);
        let reply = self.transport.post_json(&url, self.headers()?, &body).await?;
        parse_response(&reply)
    }
}
