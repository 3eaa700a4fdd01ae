//! Shared HTTP plumbing for the backend adapters

use super::BackendError;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Request-rate limiter shared by every adapter instance of one backend
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

pub fn rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Header carrying the API key; a key that cannot be sent is a credential problem
pub(crate) fn credential_header(backend: &'static str, value: &str) -> Result<HeaderValue, BackendError> {
    HeaderValue::from_str(value).map_err(|_| BackendError::InvalidCredential {
        backend: backend.to_string(),
    })
}

/// Connection settings for one adapter instance
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub api_key: String,
    pub model: String,
    /// Overrides the service's public endpoint
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl BackendSettings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

pub(crate) struct HttpTransport {
    backend: &'static str,
    client: reqwest::Client,
    rate_limiter: SharedRateLimiter,
    timeout: Duration,
}

impl HttpTransport {
    pub(crate) fn new(
        backend: &'static str,
        settings: &BackendSettings,
        rate_limiter: SharedRateLimiter,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("curio/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| BackendError::Transport {
                backend: backend.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            backend,
            client,
            rate_limiter,
            timeout: settings.request_timeout,
        })
    }

    /// POST a JSON body and return the decoded JSON reply
    pub(crate) async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
    ) -> Result<Value, BackendError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(backend = self.backend, url = %redact_query(url), "Sending generation request");

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            tracing::warn!(
                backend = self.backend,
                status = status.as_u16(),
                message = %message,
                "Generation request rejected"
            );
            return Err(BackendError::Status {
                backend: self.backend.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                backend: self.backend.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            BackendError::Transport {
                backend: self.backend.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Service error text from `{"error": {"message": ...}}` or the raw body
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect())
}

pub(crate) fn token_count(value: &Value, pointer: &str) -> u64 {
    value.pointer(pointer).and_then(Value::as_u64).unwrap_or(0)
}

fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
