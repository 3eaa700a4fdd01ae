//! curio-ai library interface
//!
//! Project analysis and curriculum generation: deterministic digest and hint
//! services, generation backends behind one trait, and a job orchestrator
//! exposed over a thin HTTP surface.

pub mod api;
pub mod backends;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod validators;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use curio_common::config::TomlConfig;
use curio_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::backends::HttpBackendProvider;
use crate::config::{AllowAll, SettingsCredentialStore};
use crate::services::ModelResolver;
use crate::workflow::{JobRunner, RunnerSettings};

/// Event bus capacity for lifecycle events
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Background job orchestrator
    pub runner: JobRunner,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(runner: JobRunner) -> Self {
        Self {
            db: runner.pool().clone(),
            runner,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Production wiring: settings-backed credentials, HTTP backends, no usage limit
    pub fn from_config(db: SqlitePool, events: EventBus, config: &TomlConfig) -> Self {
        let generation = &config.generation;
        let runner = JobRunner::new(
            db.clone(),
            events,
            Arc::new(SettingsCredentialStore::new(db.clone(), config)),
            Arc::new(AllowAll),
            Arc::new(HttpBackendProvider::new(Duration::from_secs(
                generation.request_timeout_secs,
            ))),
            ModelResolver::new(
                db,
                generation.models.clone(),
                Duration::from_secs(generation.model_cache_ttl_secs),
            ),
            RunnerSettings::from_config(generation),
        );
        Self::new(runner)
    }

    pub fn events(&self) -> &EventBus {
        self.runner.events()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::project_routes())
        .merge(api::job_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
