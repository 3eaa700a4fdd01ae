//! Generation backends
//!
//! One interface, one adapter per generative-model service. Adapters only
//! implement [`GenerationBackend::complete`]; `analyze` and `chat` are built
//! on top of it so every backend shares the same payload cleaning and
//! validation. No backend-specific type crosses this boundary.

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod openai;
pub mod payload;
pub mod prompts;

pub use factory::{default_model, BackendProvider, HttpBackendProvider, SUPPORTED_BACKENDS};
pub use http::{rate_limiter, BackendSettings, SharedRateLimiter};
pub use payload::{clean_payload, parse_payload};

use crate::models::{FailureReason, Hint, Technology, TokenUsage};
use crate::validators::technology_validator::validate_analysis;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default output ceiling when a caller does not pass one
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Errors surfaced by any backend, carrying the backend name and status
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("{backend} request failed with status {status}: {message}")]
    Status {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("{backend} transport error: {message}")]
    Transport { backend: String, message: String },

    #[error("{backend} request timed out after {seconds}s")]
    Timeout { backend: String, seconds: u64 },

    #[error("{backend} returned no text content")]
    EmptyResponse { backend: String },

    #[error("model did not return a parseable payload: {0}")]
    MalformedPayload(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("{backend} API key contains characters that cannot be sent in a request header")]
    InvalidCredential { backend: String },
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Credential rejected by the service
    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Failure reason persisted with a job this error fails
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            BackendError::MalformedPayload(_) | BackendError::EmptyResponse { .. } => {
                FailureReason::MalformedResponse
            }
            BackendError::Timeout { .. } => FailureReason::Timeout,
            BackendError::UnknownBackend(_) => FailureReason::Internal,
            BackendError::InvalidCredential { .. } => FailureReason::NoCredential,
            BackendError::Status { .. } if self.is_auth() => FailureReason::NoCredential,
            BackendError::Status { .. } | BackendError::Transport { .. } => {
                FailureReason::BackendError
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Backend-neutral request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// Backend-neutral reply: first text-bearing block plus usage
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// Result of `analyze`
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub technologies: Vec<Technology>,
    pub summary: String,
    pub usage: TokenUsage,
}

/// Result of `chat`
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name (`anthropic`, `openai`, `gemini`)
    fn name(&self) -> &str;

    /// Model identifier sent with every request
    fn model(&self) -> &str;

    /// One round trip to the service
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, BackendError>;

    /// Detect technologies from a rendered project digest
    ///
    /// The digest stands in for the raw file set. `prompt_override` replaces
    /// the built-in instruction text but keeps the digest and hints attached.
    async fn analyze(
        &self,
        digest: &str,
        hints: &[Hint],
        prompt_override: Option<&str>,
    ) -> Result<AnalysisResult, BackendError> {
        let request = CompletionRequest {
            system: Some(prompts::ANALYSIS_SYSTEM_PROMPT.to_string()),
            messages: vec![ChatMessage::user(prompts::analysis_prompt(
                digest,
                hints,
                prompt_override,
            ))],
            max_tokens: DEFAULT_MAX_TOKENS,
        };

        let response = self.complete(request).await?;
        let payload = parse_payload(&response.text)?;
        let validated = validate_analysis(&payload)
            .map_err(|e| BackendError::MalformedPayload(e.to_string()))?;

        Ok(AnalysisResult {
            technologies: validated.technologies,
            summary: validated.summary,
            usage: response.usage,
        })
    }

    /// Free-form conversation
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
    ) -> Result<ChatResponse, BackendError> {
        let response = self
            .complete(CompletionRequest {
                system: system_prompt.map(str::to_string),
                messages,
                max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            })
            .await?;

        Ok(ChatResponse {
            content: response.text,
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_mapping() {
        let status = |status| BackendError::Status {
            backend: "anthropic".into(),
            status,
            message: "x".into(),
        };

        assert_eq!(status(401).failure_reason(), FailureReason::NoCredential);
        assert_eq!(status(429).failure_reason(), FailureReason::BackendError);
        assert!(status(429).is_rate_limited());
        assert_eq!(
            BackendError::MalformedPayload("x".into()).failure_reason(),
            FailureReason::MalformedResponse
        );
        assert_eq!(
            BackendError::Timeout { backend: "openai".into(), seconds: 1 }.failure_reason(),
            FailureReason::Timeout
        );
        assert_eq!(
            BackendError::InvalidCredential { backend: "gemini".into() }.failure_reason(),
            FailureReason::NoCredential
        );
    }

    #[test]
    fn test_status_error_message_names_backend() {
        let err = BackendError::Status {
            backend: "gemini".into(),
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "gemini request failed with status 500: boom");
    }
}
