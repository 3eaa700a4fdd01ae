//! Backend construction by name

use super::anthropic::{self, AnthropicBackend};
use super::gemini::{self, GeminiBackend};
use super::http::{rate_limiter, BackendSettings, SharedRateLimiter};
use super::openai::{self, OpenAiBackend};
use super::{BackendError, GenerationBackend};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_REQUESTS_PER_MINUTE: u32 = 50;

pub const SUPPORTED_BACKENDS: [&str; 3] = [anthropic::NAME, openai::NAME, gemini::NAME];

/// Model used when neither the settings table nor the TOML file names one
pub fn default_model(backend: &str) -> Option<&'static str> {
    match backend {
        anthropic::NAME => Some("claude-sonnet-4-20250514"),
        openai::NAME => Some("gpt-4o"),
        gemini::NAME => Some("gemini-2.0-flash"),
        _ => None,
    }
}

/// Builds a ready-to-call backend for one job
///
/// The orchestrator only sees this trait, so tests substitute scripted
/// backends without touching the network.
pub trait BackendProvider: Send + Sync {
    fn create(
        &self,
        backend: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Arc<dyn GenerationBackend>, BackendError>;
}

/// Provider for the real HTTP adapters
///
/// Holds one rate limiter per backend, so every job calling a backend draws
/// from the same request budget.
#[derive(Clone)]
pub struct HttpBackendProvider {
    request_timeout: Duration,
    limiters: HashMap<&'static str, SharedRateLimiter>,
}

impl HttpBackendProvider {
    pub fn new(request_timeout: Duration) -> Self {
        Self::with_rate(request_timeout, DEFAULT_REQUESTS_PER_MINUTE)
    }

    pub fn with_rate(request_timeout: Duration, requests_per_minute: u32) -> Self {
        let limiters = SUPPORTED_BACKENDS
            .iter()
            .map(|name| (*name, rate_limiter(requests_per_minute)))
            .collect();
        Self {
            request_timeout,
            limiters,
        }
    }

    /// The limiter every adapter for `backend` shares
    pub fn rate_limiter(&self, backend: &str) -> Option<&SharedRateLimiter> {
        self.limiters.get(backend)
    }
}

impl BackendProvider for HttpBackendProvider {
    fn create(
        &self,
        backend: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Arc<dyn GenerationBackend>, BackendError> {
        let limiter = self
            .rate_limiter(backend)
            .cloned()
            .ok_or_else(|| BackendError::UnknownBackend(backend.to_string()))?;
        let settings = BackendSettings {
            request_timeout: self.request_timeout,
            ..BackendSettings::new(api_key, model)
        };

        let backend: Arc<dyn GenerationBackend> = match backend {
            anthropic::NAME => Arc::new(AnthropicBackend::new(settings, limiter)?),
            openai::NAME => Arc::new(OpenAiBackend::new(settings, limiter)?),
            gemini::NAME => Arc::new(GeminiBackend::new(settings, limiter)?),
            other => return Err(BackendError::UnknownBackend(other.to_string())),
        };
        Ok(backend)
    }
}
