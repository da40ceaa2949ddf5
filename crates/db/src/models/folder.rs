//! Folder rows.

use serde::Serialize;
use sqlx::FromRow;
use triage_core::folder::Folder;
use triage_core::types::DbId;

/// A row from the `folders` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FolderRow {
    pub id: DbId,
    pub project_id: DbId,
    pub parent_id: DbId,
    pub name: String,
}

impl From<FolderRow> for Folder {
    fn from(row: FolderRow) -> Self {
        Folder {
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
        }
    }
}
