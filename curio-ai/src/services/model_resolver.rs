//! Model selection per backend
//!
//! Fallback chain: in-memory cache, settings table (`model.<backend>`), TOML
//! `[generation.models]`, built-in default. Settings changes become visible
//! once the cached entry expires.

use super::ttl_cache::TtlCache;
use crate::backends::{default_model, BackendError};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::time::Duration;
use sqlx::SqlitePool;
use tracing::{debug, warn};

const CACHE_CAPACITY: usize = 16;

pub struct ModelResolver {
    pool: SqlitePool,
    toml_models: BTreeMap<String, String>,
    cache: TtlCache<String, String>,
}

impl ModelResolver {
    pub fn new(pool: SqlitePool, toml_models: BTreeMap<String, String>, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            pool,
            toml_models,
            cache: TtlCache::new(capacity, ttl),
        }
    }

    /// Model for `backend`; unknown backends without any configured model are an error
    pub async fn resolve(&self, backend: &str) -> Result<String, BackendError> {
        if let Some(model) = self.cache.get(&backend.to_string()) {
            return Ok(model);
        }

        let stored = match crate::db::settings::get_model(&self.pool, backend).await {
            Ok(model) => model.filter(|m| !m.trim().is_empty()),
            Err(e) => {
                // A settings read failure degrades to the static tiers
                warn!(backend, error = %e, "Model setting lookup failed");
                None
            }
        };

        let model = stored
            .or_else(|| self.toml_models.get(backend).cloned())
            .or_else(|| default_model(backend).map(str::to_string))
            .ok_or_else(|| BackendError::UnknownBackend(backend.to_string()))?;

        debug!(backend, model = %model, "Resolved model");
        self.cache.insert(backend.to_string(), model.clone());
        Ok(model)
    }

    /// Drop the cached entry so the next lookup reads the settings table
    pub fn invalidate(&self, backend: &str) {
        self.cache.invalidate(&backend.to_string());
    }
}
