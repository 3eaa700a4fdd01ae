//! Curriculum and learning module persistence

use super::{from_json, parse_timestamp, parse_uuid, to_json};
use crate::models::{CurriculumStructure, LearningModule, MatchTier};
use chrono::Utc;
use curio_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Replace the project's curriculum and modules atomically
pub async fn store_curriculum(
    pool: &SqlitePool,
    project_id: Uuid,
    structure: &CurriculumStructure,
    modules: &[LearningModule],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    store_curriculum_in(&mut tx, project_id, structure, modules).await?;
    tx.commit().await?;
    Ok(())
}

/// [`store_curriculum`] on a caller-owned connection or transaction
pub async fn store_curriculum_in(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    structure: &CurriculumStructure,
    modules: &[LearningModule],
) -> Result<()> {
    let project = project_id.to_string();
    let structure_json = to_json(structure, "curriculum structure")?;

    sqlx::query(
        r#"
        INSERT INTO curricula (project_id, title, description, difficulty, estimated_hours,
                               structure, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(project_id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            difficulty = excluded.difficulty,
            estimated_hours = excluded.estimated_hours,
            structure = excluded.structure,
            created_at = excluded.created_at
        "#,
    )
    .bind(&project)
    .bind(&structure.title)
    .bind(&structure.description)
    .bind(&structure.difficulty)
    .bind(structure.estimated_hours)
    .bind(&structure_json)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM learning_modules WHERE project_id = ?")
        .bind(&project)
        .execute(&mut *conn)
        .await?;

    for module in modules {
        sqlx::query(
            r#"
            INSERT INTO learning_modules (id, project_id, position, title, description,
                                          module_type, tech_binding, estimated_minutes,
                                          content, resolution_tier, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(module.id.to_string())
        .bind(&project)
        .bind(module.position as i64)
        .bind(&module.title)
        .bind(&module.description)
        .bind(&module.module_type)
        .bind(&module.tech_binding)
        .bind(module.estimated_minutes as i64)
        .bind(to_json(&module.content, "module content")?)
        .bind(module.resolution_tier.map(|t| t.as_str()))
        .bind(module.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn load_structure(pool: &SqlitePool, project_id: Uuid) -> Result<Option<CurriculumStructure>> {
    let structure: Option<String> =
        sqlx::query_scalar("SELECT structure FROM curricula WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_optional(pool)
            .await?;

    structure
        .as_deref()
        .map(|json| from_json(json, "curriculum structure"))
        .transpose()
}

/// Modules in curriculum order
pub async fn list_modules(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<LearningModule>> {
    let rows = sqlx::query(
        r#"
        SELECT id, project_id, position, title, description, module_type, tech_binding,
               estimated_minutes, content, resolution_tier, created_at
        FROM learning_modules
        WHERE project_id = ?
        ORDER BY position
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(module_from_row).collect()
}

fn module_from_row(row: &SqliteRow) -> Result<LearningModule> {
    let content: String = row.get("content");
    let tier: Option<String> = row.get("resolution_tier");
    let created_at: String = row.get("created_at");

    Ok(LearningModule {
        id: parse_uuid(row.get("id"))?,
        project_id: parse_uuid(row.get("project_id"))?,
        position: row.get::<i64, _>("position").max(0) as u32,
        title: row.get("title"),
        description: row.get("description"),
        module_type: row.get("module_type"),
        tech_binding: row.get("tech_binding"),
        estimated_minutes: row.get::<i64, _>("estimated_minutes").max(0) as u32,
        content: from_json(&content, "module content")?,
        resolution_tier: tier.as_deref().and_then(MatchTier::parse),
        created_at: parse_timestamp(&created_at)?,
    })
}
