//! Database access for curio-ai
//!
//! Tables are created by `curio_common::db`; this module holds the typed
//! reads and writes. UUIDs and timestamps are stored as TEXT (RFC 3339),
//! structured columns as JSON text.

pub mod curricula;
pub mod digests;
pub mod jobs;
pub mod knowledge;
pub mod projects;
pub mod settings;
pub mod snapshots;
pub mod technologies;

use chrono::{DateTime, Utc};
use curio_common::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Default bound for lock-contention retries
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Lock-wait bound from the settings table (`database_max_lock_wait_ms`)
pub async fn max_lock_wait_ms(pool: &SqlitePool) -> u64 {
    match settings::get_setting::<u64>(pool, "database_max_lock_wait_ms").await {
        Ok(Some(ms)) => ms,
        _ => DEFAULT_MAX_LOCK_WAIT_MS,
    }
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID '{}': {}", value, e)))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

pub(crate) fn from_json<T: DeserializeOwned>(value: &str, what: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", what, e)))
}
