//! Snapshot file persistence
//!
//! A snapshot is written once per upload and never mutated; storing a new
//! one replaces the previous file set for the project.

use crate::models::{Snapshot, SnapshotFile};
use curio_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub async fn store_snapshot(pool: &SqlitePool, project_id: Uuid, snapshot: &Snapshot) -> Result<()> {
    let id = project_id.to_string();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM project_files WHERE project_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    for (position, file) in snapshot.files().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO project_files (project_id, position, path, declared_type, content)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(position as i64)
        .bind(&file.path)
        .bind(&file.declared_type)
        .bind(&file.content)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(project_id = %project_id, files = snapshot.len(), "Stored snapshot");
    Ok(())
}

/// Snapshot in upload order; empty when none was stored
pub async fn load_snapshot(pool: &SqlitePool, project_id: Uuid) -> Result<Snapshot> {
    let rows = sqlx::query(
        r#"
        SELECT path, declared_type, content
        FROM project_files
        WHERE project_id = ?
        ORDER BY position
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    let files = rows
        .iter()
        .map(|row| SnapshotFile {
            path: row.get("path"),
            declared_type: row.get("declared_type"),
            content: row.get("content"),
        })
        .collect();

    Ok(Snapshot::new(files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::projects::insert_project;
    use crate::models::Project;
    use curio_common::db::init_memory_database;

    #[tokio::test]
    async fn test_snapshot_order_and_fingerprint_survive_storage() {
        let pool = init_memory_database().await.unwrap();
        let project = Project::new("o", "p");
        insert_project(&pool, &project).await.unwrap();

        let snapshot = Snapshot::new(vec![
            SnapshotFile::new("package.json", Some("{}")),
            SnapshotFile::new("src/index.ts", Some("export {}")),
            SnapshotFile::new("logo.png", None),
        ]);
        store_snapshot(&pool, project.id, &snapshot).await.unwrap();

        let loaded = load_snapshot(&pool, project.id).await.unwrap();
        assert_eq!(loaded.files(), snapshot.files());
        assert_eq!(loaded.fingerprint(), snapshot.fingerprint());
    }

    #[tokio::test]
    async fn test_store_replaces_previous_files() {
        let pool = init_memory_database().await.unwrap();
        let project = Project::new("o", "p");
        insert_project(&pool, &project).await.unwrap();

        store_snapshot(&pool, project.id, &Snapshot::new(vec![SnapshotFile::new("a.py", Some(""))]))
            .await
            .unwrap();
        store_snapshot(&pool, project.id, &Snapshot::new(vec![SnapshotFile::new("b.py", Some(""))]))
            .await
            .unwrap();

        let loaded = load_snapshot(&pool, project.id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.files()[0].path, "b.py");
    }
}
