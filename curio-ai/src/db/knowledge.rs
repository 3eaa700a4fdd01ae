//! Supplementary technology reference notes

use crate::models::name_key;
use chrono::Utc;
use curio_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn store_knowledge(pool: &SqlitePool, project_id: Uuid, technology: &str, content: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO technology_knowledge (project_id, technology_key, technology_name, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(project_id, technology_key) DO UPDATE SET
            technology_name = excluded.technology_name,
            content = excluded.content
        "#,
    )
    .bind(project_id.to_string())
    .bind(name_key(technology))
    .bind(technology)
    .bind(content)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// `(technology name, note)` pairs
pub async fn list_knowledge(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT technology_name, content FROM technology_knowledge WHERE project_id = ? ORDER BY technology_key",
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
