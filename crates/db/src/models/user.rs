//! User rows. Users are shared by every project.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use triage_core::types::DbId;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
