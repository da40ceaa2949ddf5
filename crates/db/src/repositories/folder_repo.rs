//! Repository for the `folders` table.
//!
//! No structural checks happen here; callers validate against a folder tree
//! before writing.

use sqlx::PgPool;
use triage_core::types::DbId;

use crate::models::folder::FolderRow;

/// Column list for `folders` queries.
const COLUMNS: &str = "id, project_id, parent_id, name";

/// Provides CRUD operations for folders.
pub struct FolderRepo;

impl FolderRepo {
    /// Every folder row of a project. The synthetic root is not a row.
    pub async fn list(pool: &PgPool, project_id: DbId) -> Result<Vec<FolderRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM folders WHERE project_id = $1 ORDER BY id");
        sqlx::query_as::<_, FolderRow>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Insert a folder, returning the generated ID.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        parent_id: DbId,
        name: &str,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO folders (project_id, parent_id, name) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(project_id)
        .bind(parent_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Rename a folder. Returns `true` if a row was updated.
    pub async fn rename(
        pool: &PgPool,
        project_id: DbId,
        id: DbId,
        name: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE folders SET name = $3 WHERE project_id = $1 AND id = $2")
            .bind(project_id)
            .bind(id)
            .bind(name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-parent a folder. Returns `true` if a row was updated.
    pub async fn set_parent(
        pool: &PgPool,
        project_id: DbId,
        id: DbId,
        parent_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE folders SET parent_id = $3 WHERE project_id = $1 AND id = $2")
                .bind(project_id)
                .bind(id)
                .bind(parent_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a folder. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, project_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM folders WHERE project_id = $1 AND id = $2")
            .bind(project_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
