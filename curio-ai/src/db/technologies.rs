//! Technology record persistence
//!
//! Records are unique per `(project, lower(name))` and upserted on every
//! completed analysis.

use super::{from_json, parse_timestamp, parse_uuid, to_json};
use crate::models::{name_key, Importance, TechCategory, Technology, TechnologyRecord};
use chrono::Utc;
use curio_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

/// Upsert all technologies in one transaction
///
/// Returns the names that were not previously recorded for the project.
pub async fn upsert_technologies(
    pool: &SqlitePool,
    project_id: Uuid,
    technologies: &[Technology],
) -> Result<Vec<String>> {
    let mut tx = pool.begin().await?;
    let new_names = upsert_technologies_in(&mut tx, project_id, technologies).await?;
    tx.commit().await?;
    Ok(new_names)
}

/// [`upsert_technologies`] on a caller-owned connection or transaction
pub async fn upsert_technologies_in(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    technologies: &[Technology],
) -> Result<Vec<String>> {
    let project = project_id.to_string();
    let now = Utc::now().to_rfc3339();

    let existing: HashSet<String> =
        sqlx::query_scalar::<_, String>("SELECT name_key FROM technologies WHERE project_id = ?")
            .bind(&project)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    let mut new_names = Vec::new();
    for tech in technologies {
        let key = name_key(&tech.name);
        let relationships = if tech.relationships.is_empty() {
            None
        } else {
            Some(to_json(&tech.relationships, "relationships")?)
        };

        sqlx::query(
            r#"
            INSERT INTO technologies (id, project_id, name, name_key, category, version,
                                      confidence, importance, description, relationships,
                                      created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, name_key) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                version = excluded.version,
                confidence = excluded.confidence,
                importance = excluded.importance,
                description = excluded.description,
                relationships = excluded.relationships,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&project)
        .bind(&tech.name)
        .bind(&key)
        .bind(tech.category.as_str())
        .bind(&tech.version)
        .bind(tech.confidence.clamp(0.0, 1.0))
        .bind(tech.importance.as_str())
        .bind(&tech.description)
        .bind(relationships)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        if !existing.contains(&key) {
            new_names.push(tech.name.clone());
        }
    }

    Ok(new_names)
}

/// Records ordered by confidence, highest first
pub async fn list_technologies(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<TechnologyRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, project_id, name, category, version, confidence, importance,
               description, relationships, created_at, updated_at
        FROM technologies
        WHERE project_id = ?
        ORDER BY confidence DESC, name_key
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

fn record_from_row(row: &SqliteRow) -> Result<TechnologyRecord> {
    let category: String = row.get("category");
    let importance: String = row.get("importance");
    let relationships: Option<String> = row.get("relationships");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(TechnologyRecord {
        id: parse_uuid(row.get("id"))?,
        project_id: parse_uuid(row.get("project_id"))?,
        technology: Technology {
            name: row.get("name"),
            // Rows are validated on the way in; coerce again rather than fail a read
            category: TechCategory::parse(&category).unwrap_or(TechCategory::Other),
            version: row.get("version"),
            confidence: row.get::<f64, _>("confidence").clamp(0.0, 1.0),
            importance: Importance::parse(&importance).unwrap_or(Importance::Supporting),
            description: row.get("description"),
            relationships: relationships
                .as_deref()
                .map(|json| from_json(json, "relationships"))
                .transpose()?
                .unwrap_or_default(),
        },
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
