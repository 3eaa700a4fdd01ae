//! Rendered digest cache keyed by `(project, snapshot fingerprint)`

use chrono::Utc;
use curio_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn load_digest(pool: &SqlitePool, project_id: Uuid, fingerprint: &str) -> Result<Option<String>> {
    let document: Option<String> = sqlx::query_scalar(
        "SELECT document FROM project_digests WHERE project_id = ? AND fingerprint = ?",
    )
    .bind(project_id.to_string())
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;

    Ok(document)
}

/// Store a rendered digest, dropping any for older fingerprints
pub async fn store_digest(pool: &SqlitePool, project_id: Uuid, fingerprint: &str, document: &str) -> Result<()> {
    let id = project_id.to_string();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM project_digests WHERE project_id = ? AND fingerprint <> ?")
        .bind(&id)
        .bind(fingerprint)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO project_digests (project_id, fingerprint, document, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(project_id, fingerprint) DO UPDATE SET document = excluded.document
        "#,
    )
    .bind(&id)
    .bind(fingerprint)
    .bind(document)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
