//! Credential and usage-gate resolution for curio-ai
//!
//! API keys resolve through tiers, highest priority first:
//! 1. settings table, owner-scoped (`api_key.<owner>.<backend>`)
//! 2. settings table, shared (`api_key.<backend>`)
//! 3. environment (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `GEMINI_API_KEY`)
//! 4. TOML `[api_keys]`

use async_trait::async_trait;
use curio_common::config::TomlConfig;
use curio_common::Result;
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Source of one API key per owner and backend
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn api_key(&self, owner: &str, backend: &str) -> Result<Option<String>>;
}

/// Decides whether an owner may start another generation run
#[async_trait]
pub trait UsageGate: Send + Sync {
    async fn may_start(&self, owner: &str) -> Result<bool>;
}

/// Gate that admits every run
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl UsageGate for AllowAll {
    async fn may_start(&self, _owner: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Environment variable holding the key for `backend`
pub fn api_key_env_var(backend: &str) -> String {
    format!("{}_API_KEY", backend.to_ascii_uppercase())
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Tiered resolution over the settings table, environment and TOML
pub struct SettingsCredentialStore {
    pool: SqlitePool,
    toml_keys: std::collections::BTreeMap<String, String>,
}

impl SettingsCredentialStore {
    pub fn new(pool: SqlitePool, toml_config: &TomlConfig) -> Self {
        Self {
            pool,
            toml_keys: toml_config.api_keys.clone(),
        }
    }
}

#[async_trait]
impl CredentialStore for SettingsCredentialStore {
    async fn api_key(&self, owner: &str, backend: &str) -> Result<Option<String>> {
        let owner_key = crate::db::settings::get_owner_api_key(&self.pool, owner, backend)
            .await?
            .filter(|k| is_valid_key(k));
        let shared_key = crate::db::settings::get_api_key(&self.pool, backend)
            .await?
            .filter(|k| is_valid_key(k));
        let env_key = std::env::var(api_key_env_var(backend))
            .ok()
            .filter(|k| is_valid_key(k));
        let toml_key = self
            .toml_keys
            .get(backend)
            .cloned()
            .filter(|k| is_valid_key(k));

        let sources: Vec<&str> = [
            (owner_key.is_some(), "owner settings"),
            (shared_key.is_some(), "settings"),
            (env_key.is_some(), "environment"),
            (toml_key.is_some(), "TOML"),
        ]
        .into_iter()
        .filter_map(|(present, name)| present.then_some(name))
        .collect();

        // Owner-scoped keys are expected to shadow shared ones
        if sources.len() > 1 && owner_key.is_none() {
            warn!(
                backend,
                "API key found in multiple sources: {}. Using {} (highest priority).",
                sources.join(", "),
                sources[0]
            );
        }

        if let Some(source) = sources.first() {
            debug!(backend, source, "API key resolved");
        }

        Ok(owner_key.or(shared_key).or(env_key).or(toml_key).map(|k| k.trim().to_string()))
    }
}
