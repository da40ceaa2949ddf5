//! [`EventStore`] backed by PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use triage_core::error::CoreError;
use triage_core::event::{Event, Tag, TagSet};
use triage_core::filter::{Filter, FilterAction, FilterCondition, FilterDefinition, FilterSpec};
use triage_core::folder::Folder;
use triage_core::store::{EventStore, EventStream};
use triage_core::types::{DbId, EpochMillis};

use crate::models::event::EventTagRow;
use crate::models::filter::{FilterActionRow, FilterConditionRow, FilterRow};
use crate::repositories::{EventRepo, FilterRepo, FolderRepo, ReadStateRepo, UserRepo};
use crate::DbPool;

/// Rows fetched per page when streaming events.
const DEFAULT_PAGE_SIZE: i64 = 500;

/// Storage for one project.
///
/// Event streams are read page by page (keyset on `id`), so no pool
/// connection is held while the consumer works on a page. A run can load
/// tags or write between pages even on a single-connection pool.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: DbPool,
    project_id: DbId,
    page_size: i64,
}

impl PgEventStore {
    pub fn new(pool: DbPool, project_id: DbId) -> Self {
        Self {
            pool,
            project_id,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the number of rows fetched per stream page (at least 1).
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn project_id(&self) -> DbId {
        self.project_id
    }
}

/// Assemble one filter with its rules. Any row that does not parse fails the
/// whole definition.
fn definition(
    row: FilterRow,
    conditions: Vec<FilterConditionRow>,
    actions: Vec<FilterActionRow>,
) -> Result<FilterDefinition, CoreError> {
    Ok(FilterDefinition {
        filter: Filter::try_from(row)?,
        conditions: conditions
            .into_iter()
            .map(FilterCondition::try_from)
            .collect::<Result<_, _>>()?,
        actions: actions
            .into_iter()
            .map(FilterAction::try_from)
            .collect::<Result<_, _>>()?,
    })
}

fn group_by_filter<R>(rows: Vec<R>, filter_id: impl Fn(&R) -> DbId) -> HashMap<DbId, Vec<R>> {
    let mut groups: HashMap<DbId, Vec<R>> = HashMap::new();
    for row in rows {
        groups.entry(filter_id(&row)).or_default().push(row);
    }
    groups
}

fn tag_set(rows: Vec<EventTagRow>) -> Result<TagSet, CoreError> {
    TagSet::try_from(
        rows.into_iter()
            .map(|row| Tag {
                key: row.tag_key,
                value: row.tag_value,
            })
            .collect::<Vec<_>>(),
    )
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_event(&self, event: &Event) -> Result<DbId, CoreError> {
        EventRepo::insert(&self.pool, self.project_id, event)
            .await
            .map_err(CoreError::storage)
    }

    async fn get_event(&self, id: DbId) -> Result<Option<Event>, CoreError> {
        EventRepo::find_by_id(&self.pool, self.project_id, id)
            .await
            .map_err(CoreError::storage)?
            .map(Event::try_from)
            .transpose()
    }

    fn stream_events(&self, folder_id: Option<DbId>) -> EventStream<'_> {
        // State is the id to resume after; `None` once a short page was read.
        stream::try_unfold(Some(0), move |after_id| async move {
            let Some(after_id) = after_id else {
                return Ok(None);
            };
            let rows = EventRepo::list_page(
                &self.pool,
                self.project_id,
                folder_id,
                after_id,
                self.page_size,
            )
            .await
            .map_err(CoreError::storage)?;
            if rows.is_empty() {
                return Ok(None);
            }

            let next = match rows.last() {
                Some(last) if rows.len() as i64 == self.page_size => Some(last.id),
                _ => None,
            };
            let page = stream::iter(rows.into_iter().map(Event::try_from));
            Ok::<_, CoreError>(Some((page, next)))
        })
        .try_flatten()
        .boxed()
    }

    async fn events_between(
        &self,
        from: EpochMillis,
        to: EpochMillis,
    ) -> Result<Vec<Event>, CoreError> {
        EventRepo::list_between(&self.pool, self.project_id, from, to)
            .await
            .map_err(CoreError::storage)?
            .into_iter()
            .map(Event::try_from)
            .collect()
    }

    async fn load_tags(&self, event_id: DbId) -> Result<TagSet, CoreError> {
        let rows = EventRepo::list_tags(&self.pool, event_id)
            .await
            .map_err(CoreError::storage)?;
        tag_set(rows)
    }

    async fn count_events_in_folder(&self, folder_id: DbId) -> Result<i64, CoreError> {
        EventRepo::count_in_folder(&self.pool, self.project_id, folder_id)
            .await
            .map_err(CoreError::storage)
    }

    async fn move_events(&self, event_ids: &[DbId], folder_id: DbId) -> Result<u64, CoreError> {
        EventRepo::move_many(&self.pool, self.project_id, event_ids, folder_id)
            .await
            .map_err(CoreError::storage)
    }

    async fn set_events_color(&self, event_ids: &[DbId], color: u32) -> Result<u64, CoreError> {
        EventRepo::set_color_many(&self.pool, self.project_id, event_ids, color)
            .await
            .map_err(CoreError::storage)
    }

    async fn delete_events(&self, event_ids: &[DbId]) -> Result<u64, CoreError> {
        EventRepo::delete_many(&self.pool, self.project_id, event_ids)
            .await
            .map_err(CoreError::storage)
    }

    // -----------------------------------------------------------------------
    // Folders
    // -----------------------------------------------------------------------

    async fn list_folders(&self) -> Result<Vec<Folder>, CoreError> {
        let rows = FolderRepo::list(&self.pool, self.project_id)
            .await
            .map_err(CoreError::storage)?;
        let mut folders: Vec<Folder> = rows.into_iter().map(Folder::from).collect();
        folders.push(Folder::root());
        Ok(folders)
    }

    async fn add_folder(&self, parent_id: DbId, name: &str) -> Result<DbId, CoreError> {
        FolderRepo::create(&self.pool, self.project_id, parent_id, name)
            .await
            .map_err(CoreError::storage)
    }

    async fn rename_folder(&self, id: DbId, name: &str) -> Result<(), CoreError> {
        let updated = FolderRepo::rename(&self.pool, self.project_id, id, name)
            .await
            .map_err(CoreError::storage)?;
        if !updated {
            return Err(CoreError::NotFound { entity: "folder", id });
        }
        Ok(())
    }

    async fn move_folder(&self, id: DbId, new_parent_id: DbId) -> Result<(), CoreError> {
        let updated = FolderRepo::set_parent(&self.pool, self.project_id, id, new_parent_id)
            .await
            .map_err(CoreError::storage)?;
        if !updated {
            return Err(CoreError::NotFound { entity: "folder", id });
        }
        Ok(())
    }

    async fn delete_folder(&self, id: DbId) -> Result<(), CoreError> {
        let deleted = FolderRepo::delete(&self.pool, self.project_id, id)
            .await
            .map_err(CoreError::storage)?;
        if !deleted {
            return Err(CoreError::NotFound { entity: "folder", id });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    /// Filters whose rows do not parse are logged and left out, so one bad
    /// row cannot stop every run.
    async fn load_filters(&self) -> Result<Vec<FilterDefinition>, CoreError> {
        let filters = FilterRepo::list(&self.pool, self.project_id)
            .await
            .map_err(CoreError::storage)?;
        let conditions = FilterRepo::list_conditions(&self.pool, self.project_id)
            .await
            .map_err(CoreError::storage)?;
        let actions = FilterRepo::list_actions(&self.pool, self.project_id)
            .await
            .map_err(CoreError::storage)?;

        let mut conditions = group_by_filter(conditions, |c| c.filter_id);
        let mut actions = group_by_filter(actions, |a| a.filter_id);
        let mut definitions = Vec::with_capacity(filters.len());
        for row in filters {
            let filter_id = row.id;
            let result = definition(
                row,
                conditions.remove(&filter_id).unwrap_or_default(),
                actions.remove(&filter_id).unwrap_or_default(),
            );
            match result {
                Ok(def) => definitions.push(def),
                Err(e) => tracing::warn!(
                    project_id = self.project_id,
                    filter_id,
                    error = %e,
                    "Skipping filter with unreadable rows",
                ),
            }
        }
        Ok(definitions)
    }

    async fn load_filter(&self, id: DbId) -> Result<Option<FilterDefinition>, CoreError> {
        let Some(row) = FilterRepo::find_by_id(&self.pool, self.project_id, id)
            .await
            .map_err(CoreError::storage)?
        else {
            return Ok(None);
        };
        let conditions = FilterRepo::conditions_for(&self.pool, id)
            .await
            .map_err(CoreError::storage)?;
        let actions = FilterRepo::actions_for(&self.pool, id)
            .await
            .map_err(CoreError::storage)?;
        definition(row, conditions, actions).map(Some)
    }

    async fn create_filter(&self, spec: &FilterSpec) -> Result<Filter, CoreError> {
        let row = FilterRepo::create(&self.pool, self.project_id, spec)
            .await
            .map_err(CoreError::storage)?;
        Filter::try_from(row)
    }

    async fn update_filter(
        &self,
        id: DbId,
        spec: &FilterSpec,
    ) -> Result<Option<Filter>, CoreError> {
        FilterRepo::update(&self.pool, self.project_id, id, spec)
            .await
            .map_err(CoreError::storage)?
            .map(Filter::try_from)
            .transpose()
    }

    async fn delete_filter(&self, id: DbId) -> Result<bool, CoreError> {
        FilterRepo::delete(&self.pool, self.project_id, id)
            .await
            .map_err(CoreError::storage)
    }

    async fn replace_filter_rules(
        &self,
        filter_id: DbId,
        conditions: &[FilterCondition],
        actions: &[FilterAction],
    ) -> Result<(), CoreError> {
        let replaced =
            FilterRepo::replace_rules(&self.pool, self.project_id, filter_id, conditions, actions)
                .await
                .map_err(CoreError::storage)?;
        if !replaced {
            return Err(CoreError::NotFound {
                entity: "filter",
                id: filter_id,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users and read state
    // -----------------------------------------------------------------------

    async fn list_user_ids(&self) -> Result<Vec<DbId>, CoreError> {
        UserRepo::list_ids(&self.pool)
            .await
            .map_err(CoreError::storage)
    }

    async fn mark_read(&self, user_id: DbId, event_ids: &[DbId]) -> Result<u64, CoreError> {
        ReadStateRepo::mark_read(&self.pool, self.project_id, user_id, event_ids)
            .await
            .map_err(CoreError::storage)
    }

    async fn mark_unread(&self, user_id: DbId, event_ids: &[DbId]) -> Result<u64, CoreError> {
        ReadStateRepo::mark_unread(&self.pool, self.project_id, user_id, event_ids)
            .await
            .map_err(CoreError::storage)
    }

    async fn read_event_ids(&self, user_id: DbId) -> Result<Vec<DbId>, CoreError> {
        ReadStateRepo::list_read(&self.pool, self.project_id, user_id)
            .await
            .map_err(CoreError::storage)
    }
}
