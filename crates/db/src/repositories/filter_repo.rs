//! Repository for the `filters`, `filter_conditions` and `filter_actions`
//! tables.

use sqlx::PgPool;
use triage_core::filter::{FilterAction, FilterCondition, FilterSpec};
use triage_core::types::DbId;

use crate::models::filter::{FilterActionRow, FilterConditionRow, FilterRow};

/// Column list for `filters` queries.
const COLUMNS: &str = "id, project_id, name, enabled, condition_handling, sort_order";

/// Column list for `filter_conditions` queries.
const CONDITION_COLUMNS: &str =
    "id, filter_id, position, enabled, field, operator, query, is_regex, invert";

/// Column list for `filter_actions` queries.
const ACTION_COLUMNS: &str = "id, filter_id, position, enabled, operator, argument";

/// Provides CRUD operations for filters and their rules.
pub struct FilterRepo;

impl FilterRepo {
    /// List a project's filters in run order.
    pub async fn list(pool: &PgPool, project_id: DbId) -> Result<Vec<FilterRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM filters WHERE project_id = $1 ORDER BY sort_order, id"
        );
        sqlx::query_as::<_, FilterRow>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<FilterRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM filters WHERE project_id = $1 AND id = $2");
        sqlx::query_as::<_, FilterRow>(&query)
            .bind(project_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a filter, returning the created row.
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        spec: &FilterSpec,
    ) -> Result<FilterRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO filters (project_id, name, enabled, condition_handling, sort_order) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FilterRow>(&query)
            .bind(project_id)
            .bind(&spec.name)
            .bind(spec.enabled)
            .bind(spec.condition_handling.as_str())
            .bind(spec.sort_order)
            .fetch_one(pool)
            .await
    }

    /// Update a filter's own fields. Returns `None` if no row matched.
    pub async fn update(
        pool: &PgPool,
        project_id: DbId,
        id: DbId,
        spec: &FilterSpec,
    ) -> Result<Option<FilterRow>, sqlx::Error> {
        let query = format!(
            "UPDATE filters SET \
                name = $3, \
                enabled = $4, \
                condition_handling = $5, \
                sort_order = $6 \
             WHERE project_id = $1 AND id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FilterRow>(&query)
            .bind(project_id)
            .bind(id)
            .bind(&spec.name)
            .bind(spec.enabled)
            .bind(spec.condition_handling.as_str())
            .bind(spec.sort_order)
            .fetch_optional(pool)
            .await
    }

    /// Delete a filter; its conditions and actions cascade. Returns `true`
    /// if a row was removed.
    pub async fn delete(pool: &PgPool, project_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM filters WHERE project_id = $1 AND id = $2")
            .bind(project_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Conditions of every filter in a project, grouped by filter in
    /// declared order.
    pub async fn list_conditions(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<FilterConditionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {CONDITION_COLUMNS} FROM filter_conditions \
             WHERE filter_id IN (SELECT id FROM filters WHERE project_id = $1) \
             ORDER BY filter_id, position, id"
        );
        sqlx::query_as::<_, FilterConditionRow>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Actions of every filter in a project, grouped by filter in declared
    /// order.
    pub async fn list_actions(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<FilterActionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ACTION_COLUMNS} FROM filter_actions \
             WHERE filter_id IN (SELECT id FROM filters WHERE project_id = $1) \
             ORDER BY filter_id, position, id"
        );
        sqlx::query_as::<_, FilterActionRow>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    pub async fn conditions_for(
        pool: &PgPool,
        filter_id: DbId,
    ) -> Result<Vec<FilterConditionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {CONDITION_COLUMNS} FROM filter_conditions \
             WHERE filter_id = $1 ORDER BY position, id"
        );
        sqlx::query_as::<_, FilterConditionRow>(&query)
            .bind(filter_id)
            .fetch_all(pool)
            .await
    }

    pub async fn actions_for(
        pool: &PgPool,
        filter_id: DbId,
    ) -> Result<Vec<FilterActionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ACTION_COLUMNS} FROM filter_actions \
             WHERE filter_id = $1 ORDER BY position, id"
        );
        sqlx::query_as::<_, FilterActionRow>(&query)
            .bind(filter_id)
            .fetch_all(pool)
            .await
    }

    /// Replace every condition and action of a filter within a transaction.
    ///
    /// Returns `false` (and writes nothing) if the filter does not belong to
    /// the project.
    pub async fn replace_rules(
        pool: &PgPool,
        project_id: DbId,
        filter_id: DbId,
        conditions: &[FilterCondition],
        actions: &[FilterAction],
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> =
            sqlx::query_scalar("SELECT id FROM filters WHERE project_id = $1 AND id = $2 FOR UPDATE")
                .bind(project_id)
                .bind(filter_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM filter_conditions WHERE filter_id = $1")
            .bind(filter_id)
            .execute(&mut *tx)
            .await?;
        for (position, condition) in conditions.iter().enumerate() {
            sqlx::query(
                "INSERT INTO filter_conditions \
                    (filter_id, position, enabled, field, operator, query, is_regex, invert) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(filter_id)
            .bind(position as i32)
            .bind(condition.enabled)
            .bind(&condition.field)
            .bind(condition.operator.as_str())
            .bind(&condition.query)
            .bind(condition.regex)
            .bind(condition.invert)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM filter_actions WHERE filter_id = $1")
            .bind(filter_id)
            .execute(&mut *tx)
            .await?;
        for (position, action) in actions.iter().enumerate() {
            sqlx::query(
                "INSERT INTO filter_actions (filter_id, position, enabled, operator, argument) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(filter_id)
            .bind(position as i32)
            .bind(action.enabled)
            .bind(action.operator.as_str())
            .bind(&action.argument)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
