//! Settings database operations
//!
//! Key-value accessors for the `settings` table. Credentials live under
//! `api_key.<backend>`, model selections under `model.<backend>`.

use curio_common::{Error, Result};
use sqlx::{Pool, Sqlite};

fn api_key_setting(backend: &str) -> String {
    format!("api_key.{}", backend)
}

fn model_setting(backend: &str) -> String {
    format!("model.{}", backend)
}

/// Stored API key for `backend`, if any
pub async fn get_api_key(db: &Pool<Sqlite>, backend: &str) -> Result<Option<String>> {
    get_setting::<String>(db, &api_key_setting(backend)).await
}

pub async fn set_api_key(db: &Pool<Sqlite>, backend: &str, key: &str) -> Result<()> {
    set_setting(db, &api_key_setting(backend), key).await
}

/// Key stored for one owner (`api_key.<owner>.<backend>`)
pub async fn get_owner_api_key(db: &Pool<Sqlite>, owner: &str, backend: &str) -> Result<Option<String>> {
    get_setting::<String>(db, &format!("api_key.{}.{}", owner, backend)).await
}

pub async fn set_owner_api_key(db: &Pool<Sqlite>, owner: &str, backend: &str, key: &str) -> Result<()> {
    set_setting(db, &format!("api_key.{}.{}", owner, backend), key).await
}

/// Stored model override for `backend`, if any
pub async fn get_model(db: &Pool<Sqlite>, backend: &str) -> Result<Option<String>> {
    get_setting::<String>(db, &model_setting(backend)).await
}

pub async fn set_model(db: &Pool<Sqlite>, backend: &str, model: &str) -> Result<()> {
    set_setting(db, &model_setting(backend), model).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
