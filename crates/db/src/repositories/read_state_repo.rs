//! Repository for the `event_reads` table.
//!
//! A row means the user has read the event; its absence means unread.

use sqlx::PgPool;
use triage_core::types::DbId;

/// Provides per-user read-state operations.
pub struct ReadStateRepo;

impl ReadStateRepo {
    /// Mark a project's events read for one user. Already-read events and
    /// ids outside the project are left alone.
    ///
    /// Returns the number of newly inserted rows.
    pub async fn mark_read(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
        event_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO event_reads (user_id, event_id) \
             SELECT $1, e.id FROM events e WHERE e.project_id = $2 AND e.id = ANY($3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(project_id)
        .bind(event_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark a project's events unread for one user. Returns the number of
    /// removed rows.
    pub async fn mark_unread(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
        event_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM event_reads r USING events e \
             WHERE r.event_id = e.id \
               AND r.user_id = $1 \
               AND e.project_id = $2 \
               AND r.event_id = ANY($3)",
        )
        .bind(user_id)
        .bind(project_id)
        .bind(event_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Ids of a project's events the user has read, ascending.
    pub async fn list_read(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT r.event_id FROM event_reads r \
             JOIN events e ON e.id = r.event_id \
             WHERE r.user_id = $1 AND e.project_id = $2 \
             ORDER BY r.event_id",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_all(pool)
        .await
    }
}
