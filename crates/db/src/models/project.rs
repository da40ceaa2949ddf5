//! Project rows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use triage_core::types::DbId;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
