//! Repository for the `events` and `event_tags` tables.

use sqlx::PgPool;
use triage_core::event::Event;
use triage_core::types::{DbId, EpochMillis};

use crate::models::event::{color_to_column, EventRow, EventTagRow};

/// Column list for `events` queries.
const COLUMNS: &str =
    "id, project_id, folder_id, event_type, subtype, message, occurred_at, color, hash";

/// Provides read/write operations for events and their tags.
pub struct EventRepo;

impl EventRepo {
    /// Insert an event and its tags in one transaction, returning the new ID.
    ///
    /// The event's placeholders and hash must already be applied.
    pub async fn insert(pool: &PgPool, project_id: DbId, event: &Event) -> Result<DbId, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let id: DbId = sqlx::query_scalar(
            "INSERT INTO events \
                (project_id, folder_id, event_type, subtype, message, occurred_at, color, hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(project_id)
        .bind(event.folder_id)
        .bind(event.event_type.as_str())
        .bind(&event.subtype)
        .bind(&event.message)
        .bind(event.date)
        .bind(color_to_column(event.color))
        .bind(&event.hash)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(tags) = event.tags.as_ref().filter(|t| !t.is_empty()) {
            let (keys, values): (Vec<String>, Vec<String>) = tags
                .iter()
                .map(|t| (t.key.clone(), t.value.clone()))
                .unzip();
            sqlx::query(
                "INSERT INTO event_tags (event_id, tag_key, tag_value) \
                 SELECT $1, k, v FROM UNNEST($2::TEXT[], $3::TEXT[]) AS t(k, v)",
            )
            .bind(id)
            .bind(keys)
            .bind(values)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<EventRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM events WHERE project_id = $1 AND id = $2");
        sqlx::query_as::<_, EventRow>(&query)
            .bind(project_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// One page of a project's events with `id > after_id`, in id order,
    /// optionally limited to one folder.
    pub async fn list_page(
        pool: &PgPool,
        project_id: DbId,
        folder_id: Option<DbId>,
        after_id: DbId,
        limit: i64,
    ) -> Result<Vec<EventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE project_id = $1 \
               AND ($2::BIGINT IS NULL OR folder_id = $2) \
               AND id > $3 \
             ORDER BY id \
             LIMIT $4"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(project_id)
            .bind(folder_id)
            .bind(after_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Events with `from <= occurred_at < to`, oldest first.
    pub async fn list_between(
        pool: &PgPool,
        project_id: DbId,
        from: EpochMillis,
        to: EpochMillis,
    ) -> Result<Vec<EventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE project_id = $1 AND occurred_at >= $2 AND occurred_at < $3 \
             ORDER BY occurred_at, id"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(project_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    pub async fn list_tags(pool: &PgPool, event_id: DbId) -> Result<Vec<EventTagRow>, sqlx::Error> {
        sqlx::query_as::<_, EventTagRow>(
            "SELECT event_id, tag_key, tag_value FROM event_tags WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_in_folder(
        pool: &PgPool,
        project_id: DbId,
        folder_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE project_id = $1 AND folder_id = $2")
            .bind(project_id)
            .bind(folder_id)
            .fetch_one(pool)
            .await
    }

    /// Move many events into one folder. Returns the number of rows updated.
    pub async fn move_many(
        pool: &PgPool,
        project_id: DbId,
        ids: &[DbId],
        folder_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE events SET folder_id = $3 WHERE project_id = $1 AND id = ANY($2)",
        )
        .bind(project_id)
        .bind(ids)
        .bind(folder_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Set one color on many events. Returns the number of rows updated.
    pub async fn set_color_many(
        pool: &PgPool,
        project_id: DbId,
        ids: &[DbId],
        color: u32,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE events SET color = $3 WHERE project_id = $1 AND id = ANY($2)")
                .bind(project_id)
                .bind(ids)
                .bind(color_to_column(color))
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Delete many events; tags and read state cascade. Returns the number of
    /// rows removed.
    pub async fn delete_many(
        pool: &PgPool,
        project_id: DbId,
        ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE project_id = $1 AND id = ANY($2)")
            .bind(project_id)
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
