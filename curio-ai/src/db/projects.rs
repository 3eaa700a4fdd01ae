//! Project database operations

use super::{max_lock_wait_ms, parse_timestamp, parse_uuid};
use crate::models::{CurriculumStatus, Project, ProjectStatus};
use crate::utils::retry_on_lock;
use chrono::Utc;
use curio_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

pub async fn insert_project(pool: &SqlitePool, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO projects (id, owner, name, status, curriculum_status,
                              architecture_summary, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project.id.to_string())
    .bind(&project.owner)
    .bind(&project.name)
    .bind(project.status.as_str())
    .bind(project.curriculum_status.as_str())
    .bind(&project.architecture_summary)
    .bind(project.created_at.to_rfc3339())
    .bind(project.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_project(pool: &SqlitePool, project_id: Uuid) -> Result<Option<Project>> {
    let row = sqlx::query(
        r#"
        SELECT id, owner, name, status, curriculum_status, architecture_summary,
               created_at, updated_at
        FROM projects
        WHERE id = ?
        "#,
    )
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| project_from_row(&row)).transpose()
}

/// Like [`load_project`], but a missing row is `Error::NotFound`
pub async fn require_project(pool: &SqlitePool, project_id: Uuid) -> Result<Project> {
    load_project(pool, project_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))
}

pub async fn set_status(pool: &SqlitePool, project_id: Uuid, status: ProjectStatus) -> Result<()> {
    let id = project_id.to_string();
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("set_project_status", max_wait_ms, || async {
        sqlx::query("UPDATE projects SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(&id)
            .execute(pool)
            .await?;
        Ok(())
    })
    .await
}

pub async fn set_curriculum_status(
    pool: &SqlitePool,
    project_id: Uuid,
    status: CurriculumStatus,
) -> Result<()> {
    let id = project_id.to_string();
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("set_curriculum_status", max_wait_ms, || async {
        sqlx::query("UPDATE projects SET curriculum_status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(&id)
            .execute(pool)
            .await?;
        Ok(())
    })
    .await
}

/// Record the analysis outcome: summary plus `analyzed` status
pub async fn mark_analyzed(pool: &SqlitePool, project_id: Uuid, summary: &str) -> Result<()> {
    let id = project_id.to_string();
    let max_wait_ms = max_lock_wait_ms(pool).await;

    retry_on_lock("mark_project_analyzed", max_wait_ms, || async {
        sqlx::query(
            "UPDATE projects SET status = ?, architecture_summary = ?, updated_at = ? WHERE id = ?",
        )
        .bind(ProjectStatus::Analyzed.as_str())
        .bind(summary)
        .bind(Utc::now().to_rfc3339())
        .bind(&id)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// [`mark_analyzed`] inside a caller-owned transaction
pub async fn mark_analyzed_in(conn: &mut SqliteConnection, project_id: Uuid, summary: &str) -> Result<()> {
    sqlx::query("UPDATE projects SET status = ?, architecture_summary = ?, updated_at = ? WHERE id = ?")
        .bind(ProjectStatus::Analyzed.as_str())
        .bind(summary)
        .bind(Utc::now().to_rfc3339())
        .bind(project_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// [`set_curriculum_status`] inside a caller-owned transaction
pub async fn set_curriculum_status_in(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    status: CurriculumStatus,
) -> Result<()> {
    sqlx::query("UPDATE projects SET curriculum_status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(project_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    let status: String = row.get("status");
    let curriculum_status: String = row.get("curriculum_status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Project {
        id: parse_uuid(row.get("id"))?,
        owner: row.get("owner"),
        name: row.get("name"),
        status: ProjectStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown project status '{}'", status)))?,
        curriculum_status: CurriculumStatus::parse(&curriculum_status).ok_or_else(|| {
            Error::Internal(format!("Unknown curriculum status '{}'", curriculum_status))
        })?,
        architecture_summary: row.get("architecture_summary"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use curio_common::db::init_memory_database;

    #[tokio::test]
    async fn test_project_status_updates() {
        let pool = init_memory_database().await.unwrap();
        let project = Project::new("alice", "shop");
        insert_project(&pool, &project).await.unwrap();

        set_status(&pool, project.id, ProjectStatus::Analyzing).await.unwrap();
        mark_analyzed(&pool, project.id, "A storefront.").await.unwrap();
        set_curriculum_status(&pool, project.id, CurriculumStatus::Generating).await.unwrap();

        let loaded = require_project(&pool, project.id).await.unwrap();
        assert_eq!(loaded.status, ProjectStatus::Analyzed);
        assert_eq!(loaded.curriculum_status, CurriculumStatus::Generating);
        assert_eq!(loaded.architecture_summary.as_deref(), Some("A storefront."));
        assert_eq!(loaded.owner, "alice");
    }

    #[tokio::test]
    async fn test_missing_project_is_not_found() {
        let pool = init_memory_database().await.unwrap();
        assert!(load_project(&pool, Uuid::new_v4()).await.unwrap().is_none());
        assert!(matches!(
            require_project(&pool, Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }
}
