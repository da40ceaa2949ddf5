//! Event and event-tag rows.

use serde::Serialize;
use sqlx::FromRow;
use triage_core::error::CoreError;
use triage_core::event::{Event, EventType};
use triage_core::types::{DbId, EpochMillis};

/// A row from the `events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRow {
    pub id: DbId,
    pub project_id: DbId,
    pub folder_id: DbId,
    pub event_type: String,
    pub subtype: String,
    pub message: String,
    pub occurred_at: EpochMillis,
    /// 0xRRGGBB; always fits in a signed 32-bit column.
    pub color: i32,
    pub hash: String,
}

/// A row from the `event_tags` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventTagRow {
    pub event_id: DbId,
    pub tag_key: String,
    pub tag_value: String,
}

/// Convert an in-memory color into its column value.
pub fn color_to_column(color: u32) -> i32 {
    (color & 0x00FF_FFFF) as i32
}

/// Events are converted without tags; the engine loads them on demand.
impl TryFrom<EventRow> for Event {
    type Error = CoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            folder_id: row.folder_id,
            event_type: row.event_type.parse::<EventType>()?,
            subtype: row.subtype,
            message: row.message,
            date: row.occurred_at,
            color: (row.color as u32) & 0x00FF_FFFF,
            hash: row.hash,
            tags: None,
        })
    }
}
