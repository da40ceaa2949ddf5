//! Repository for the `projects` table.

use sqlx::PgPool;
use triage_core::types::DbId;

use crate::models::project::Project;

/// Column list for `projects` queries.
const COLUMNS: &str = "id, name, created_at";

/// Provides CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project, returning the created row.
    pub async fn create(pool: &PgPool, name: &str) -> Result<Project, sqlx::Error> {
        let query = format!("INSERT INTO projects (name) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, Project>(&query)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all projects ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects ORDER BY lower(name)");
        sqlx::query_as::<_, Project>(&query).fetch_all(pool).await
    }
}
