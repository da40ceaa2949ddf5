//! Storage contract consumed by the filter engine.
//!
//! One store instance is bound to one project. Implementations own their
//! transaction and retry discipline; the engine never retries.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::CoreError;
use crate::event::{Event, TagSet};
use crate::filter::{Filter, FilterAction, FilterCondition, FilterDefinition, FilterSpec};
use crate::folder::Folder;
use crate::types::{DbId, EpochMillis};

/// Lazily fetched events.
pub type EventStream<'a> = BoxStream<'a, Result<Event, CoreError>>;

#[async_trait]
pub trait EventStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Insert an event together with its tags, returning the new id. The
    /// event's hash and placeholders must already be applied.
    async fn insert_event(&self, event: &Event) -> Result<DbId, CoreError>;

    /// Fetch one event. Tags are not attached.
    async fn get_event(&self, id: DbId) -> Result<Option<Event>, CoreError>;

    /// Stream events without tags, either all of them or those in one folder,
    /// in id order.
    fn stream_events(&self, folder_id: Option<DbId>) -> EventStream<'_>;

    /// Events whose date falls in `[from, to)`, oldest first, without tags.
    async fn events_between(
        &self,
        from: EpochMillis,
        to: EpochMillis,
    ) -> Result<Vec<Event>, CoreError>;

    async fn load_tags(&self, event_id: DbId) -> Result<TagSet, CoreError>;

    async fn count_events_in_folder(&self, folder_id: DbId) -> Result<i64, CoreError>;

    /// Move every listed event into `folder_id`. Returns rows affected.
    async fn move_events(&self, event_ids: &[DbId], folder_id: DbId) -> Result<u64, CoreError>;

    async fn set_events_color(&self, event_ids: &[DbId], color: u32) -> Result<u64, CoreError>;

    async fn delete_events(&self, event_ids: &[DbId]) -> Result<u64, CoreError>;

    // -----------------------------------------------------------------------
    // Folders
    // -----------------------------------------------------------------------

    /// Every folder row plus the synthetic root.
    async fn list_folders(&self) -> Result<Vec<Folder>, CoreError>;

    async fn add_folder(&self, parent_id: DbId, name: &str) -> Result<DbId, CoreError>;

    async fn rename_folder(&self, id: DbId, name: &str) -> Result<(), CoreError>;

    async fn move_folder(&self, id: DbId, new_parent_id: DbId) -> Result<(), CoreError>;

    async fn delete_folder(&self, id: DbId) -> Result<(), CoreError>;

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    /// Every filter with its conditions and actions, ordered by sort order
    /// then id. Conditions and actions keep their declared order.
    async fn load_filters(&self) -> Result<Vec<FilterDefinition>, CoreError>;

    async fn load_filter(&self, id: DbId) -> Result<Option<FilterDefinition>, CoreError>;

    async fn create_filter(&self, spec: &FilterSpec) -> Result<Filter, CoreError>;

    async fn update_filter(&self, id: DbId, spec: &FilterSpec)
        -> Result<Option<Filter>, CoreError>;

    /// Delete a filter with its conditions and actions.
    async fn delete_filter(&self, id: DbId) -> Result<bool, CoreError>;

    /// Replace all conditions and actions of a filter, in the given order.
    async fn replace_filter_rules(
        &self,
        filter_id: DbId,
        conditions: &[FilterCondition],
        actions: &[FilterAction],
    ) -> Result<(), CoreError>;

    // -----------------------------------------------------------------------
    // Users and read state
    // -----------------------------------------------------------------------

    /// Every user account on the system.
    async fn list_user_ids(&self) -> Result<Vec<DbId>, CoreError>;

    async fn mark_read(&self, user_id: DbId, event_ids: &[DbId]) -> Result<u64, CoreError>;

    async fn mark_unread(&self, user_id: DbId, event_ids: &[DbId]) -> Result<u64, CoreError>;

    async fn read_event_ids(&self, user_id: DbId) -> Result<Vec<DbId>, CoreError>;
}
