//! In-memory [`EventStore`].
//!
//! Backs engine tests and dry runs. Every mutating call is appended to a
//! write log so callers can assert exactly which storage calls a run made.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use triage_core::error::CoreError;
use triage_core::event::{Event, TagSet};
use triage_core::filter::{Filter, FilterAction, FilterCondition, FilterDefinition, FilterSpec};
use triage_core::folder::Folder;
use triage_core::store::{EventStore, EventStream};
use triage_core::types::{DbId, EpochMillis};

/// One mutating storage call, as recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    InsertEvent(DbId),
    MoveEvents { ids: Vec<DbId>, folder_id: DbId },
    SetColor { ids: Vec<DbId>, color: u32 },
    DeleteEvents(Vec<DbId>),
    MarkRead { user_id: DbId, ids: Vec<DbId> },
    MarkUnread { user_id: DbId, ids: Vec<DbId> },
    AddFolder { id: DbId, parent_id: DbId },
    RenameFolder(DbId),
    MoveFolder { id: DbId, parent_id: DbId },
    DeleteFolder(DbId),
    CreateFilter(DbId),
    UpdateFilter(DbId),
    DeleteFilter(DbId),
    ReplaceFilterRules(DbId),
}

#[derive(Debug, Default)]
struct State {
    last_id: DbId,
    /// Stored with their tags attached.
    events: BTreeMap<DbId, Event>,
    folders: BTreeMap<DbId, Folder>,
    filters: BTreeMap<DbId, FilterDefinition>,
    users: BTreeSet<DbId>,
    /// (user id, event id) pairs marked read.
    reads: BTreeSet<(DbId, DbId)>,
    writes: Vec<StoreWrite>,
    folder_list_calls: usize,
    tag_loads: usize,
    fail_moves: bool,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }
}

/// Event store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

/// Copy of a stored event as `get_event` and the stream return it.
fn without_tags(event: &Event) -> Event {
    Event {
        tags: None,
        ..event.clone()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, user_id: DbId) {
        self.state().users.insert(user_id);
    }

    /// Insert a folder row as-is, bypassing every check. Used to seed
    /// corrupted hierarchies.
    pub fn put_folder(&self, folder: Folder) {
        let mut state = self.state();
        state.last_id = state.last_id.max(folder.id);
        state.folders.insert(folder.id, folder);
    }

    /// Every mutating call made so far, in order.
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.state().writes.clone()
    }

    /// Make every later `move_events` call fail without touching state.
    pub fn fail_moves(&self) {
        self.state().fail_moves = true;
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    pub fn folder_list_calls(&self) -> usize {
        self.state().folder_list_calls
    }

    pub fn tag_loads(&self) -> usize {
        self.state().tag_loads
    }

    /// A stored event with its tags.
    pub fn event(&self, id: DbId) -> Option<Event> {
        self.state().events.get(&id).cloned()
    }

    pub fn is_read(&self, user_id: DbId, event_id: DbId) -> bool {
        self.state().reads.contains(&(user_id, event_id))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: &Event) -> Result<DbId, CoreError> {
        let mut state = self.state();
        let id = state.next_id();
        let mut stored = event.clone();
        stored.id = id;
        stored.tags.get_or_insert_with(TagSet::new);
        state.events.insert(id, stored);
        state.writes.push(StoreWrite::InsertEvent(id));
        Ok(id)
    }

    async fn get_event(&self, id: DbId) -> Result<Option<Event>, CoreError> {
        Ok(self.state().events.get(&id).map(without_tags))
    }

    fn stream_events(&self, folder_id: Option<DbId>) -> EventStream<'_> {
        let events: Vec<Event> = self
            .state()
            .events
            .values()
            .filter(|e| folder_id.map_or(true, |f| e.folder_id == f))
            .map(without_tags)
            .collect();
        stream::iter(events.into_iter().map(Ok)).boxed()
    }

    async fn events_between(
        &self,
        from: EpochMillis,
        to: EpochMillis,
    ) -> Result<Vec<Event>, CoreError> {
        let mut events: Vec<Event> = self
            .state()
            .events
            .values()
            .filter(|e| e.date >= from && e.date < to)
            .map(without_tags)
            .collect();
        events.sort_by_key(|e| (e.date, e.id));
        Ok(events)
    }

    async fn load_tags(&self, event_id: DbId) -> Result<TagSet, CoreError> {
        let mut state = self.state();
        state.tag_loads += 1;
        Ok(state
            .events
            .get(&event_id)
            .and_then(|e| e.tags.clone())
            .unwrap_or_default())
    }

    async fn count_events_in_folder(&self, folder_id: DbId) -> Result<i64, CoreError> {
        let count = self
            .state()
            .events
            .values()
            .filter(|e| e.folder_id == folder_id)
            .count();
        Ok(count as i64)
    }

    async fn move_events(&self, event_ids: &[DbId], folder_id: DbId) -> Result<u64, CoreError> {
        let mut state = self.state();
        if state.fail_moves {
            return Err(CoreError::Internal("move_events unavailable".to_string()));
        }
        let mut affected = 0;
        for id in event_ids {
            if let Some(event) = state.events.get_mut(id) {
                event.folder_id = folder_id;
                affected += 1;
            }
        }
        state.writes.push(StoreWrite::MoveEvents {
            ids: event_ids.to_vec(),
            folder_id,
        });
        Ok(affected)
    }

    async fn set_events_color(&self, event_ids: &[DbId], color: u32) -> Result<u64, CoreError> {
        let mut state = self.state();
        let mut affected = 0;
        for id in event_ids {
            if let Some(event) = state.events.get_mut(id) {
                event.color = color;
                affected += 1;
            }
        }
        state.writes.push(StoreWrite::SetColor {
            ids: event_ids.to_vec(),
            color,
        });
        Ok(affected)
    }

    async fn delete_events(&self, event_ids: &[DbId]) -> Result<u64, CoreError> {
        let mut state = self.state();
        let mut affected = 0;
        for id in event_ids {
            if state.events.remove(id).is_some() {
                affected += 1;
            }
        }
        state.reads.retain(|(_, event_id)| !event_ids.contains(event_id));
        state.writes.push(StoreWrite::DeleteEvents(event_ids.to_vec()));
        Ok(affected)
    }

    async fn list_folders(&self) -> Result<Vec<Folder>, CoreError> {
        let mut state = self.state();
        state.folder_list_calls += 1;
        let mut folders: Vec<Folder> = state.folders.values().cloned().collect();
        folders.push(Folder::root());
        Ok(folders)
    }

    async fn add_folder(&self, parent_id: DbId, name: &str) -> Result<DbId, CoreError> {
        let mut state = self.state();
        let id = state.next_id();
        state.folders.insert(
            id,
            Folder {
                id,
                parent_id,
                name: name.to_string(),
            },
        );
        state.writes.push(StoreWrite::AddFolder { id, parent_id });
        Ok(id)
    }

    async fn rename_folder(&self, id: DbId, name: &str) -> Result<(), CoreError> {
        let mut state = self.state();
        let folder = state
            .folders
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "folder", id })?;
        folder.name = name.to_string();
        state.writes.push(StoreWrite::RenameFolder(id));
        Ok(())
    }

    async fn move_folder(&self, id: DbId, new_parent_id: DbId) -> Result<(), CoreError> {
        let mut state = self.state();
        let folder = state
            .folders
            .get_mut(&id)
            .ok_or(CoreError::NotFound { entity: "folder", id })?;
        folder.parent_id = new_parent_id;
        state.writes.push(StoreWrite::MoveFolder {
            id,
            parent_id: new_parent_id,
        });
        Ok(())
    }

    async fn delete_folder(&self, id: DbId) -> Result<(), CoreError> {
        let mut state = self.state();
        state
            .folders
            .remove(&id)
            .ok_or(CoreError::NotFound { entity: "folder", id })?;
        state.writes.push(StoreWrite::DeleteFolder(id));
        Ok(())
    }

    async fn load_filters(&self) -> Result<Vec<FilterDefinition>, CoreError> {
        let mut filters: Vec<FilterDefinition> = self.state().filters.values().cloned().collect();
        filters.sort_by_key(|def| (def.filter.sort_order, def.filter.id));
        Ok(filters)
    }

    async fn load_filter(&self, id: DbId) -> Result<Option<FilterDefinition>, CoreError> {
        Ok(self.state().filters.get(&id).cloned())
    }

    async fn create_filter(&self, spec: &FilterSpec) -> Result<Filter, CoreError> {
        let mut state = self.state();
        let filter = Filter {
            id: state.next_id(),
            name: spec.name.clone(),
            enabled: spec.enabled,
            condition_handling: spec.condition_handling,
            sort_order: spec.sort_order,
        };
        state.filters.insert(
            filter.id,
            FilterDefinition {
                filter: filter.clone(),
                conditions: Vec::new(),
                actions: Vec::new(),
            },
        );
        state.writes.push(StoreWrite::CreateFilter(filter.id));
        Ok(filter)
    }

    async fn update_filter(
        &self,
        id: DbId,
        spec: &FilterSpec,
    ) -> Result<Option<Filter>, CoreError> {
        let mut state = self.state();
        let Some(def) = state.filters.get_mut(&id) else {
            return Ok(None);
        };
        def.filter.name = spec.name.clone();
        def.filter.enabled = spec.enabled;
        def.filter.condition_handling = spec.condition_handling;
        def.filter.sort_order = spec.sort_order;
        let filter = def.filter.clone();
        state.writes.push(StoreWrite::UpdateFilter(id));
        Ok(Some(filter))
    }

    async fn delete_filter(&self, id: DbId) -> Result<bool, CoreError> {
        let mut state = self.state();
        let removed = state.filters.remove(&id).is_some();
        if removed {
            state.writes.push(StoreWrite::DeleteFilter(id));
        }
        Ok(removed)
    }

    async fn replace_filter_rules(
        &self,
        filter_id: DbId,
        conditions: &[FilterCondition],
        actions: &[FilterAction],
    ) -> Result<(), CoreError> {
        let mut state = self.state();
        if !state.filters.contains_key(&filter_id) {
            return Err(CoreError::NotFound {
                entity: "filter",
                id: filter_id,
            });
        }
        let mut conditions = conditions.to_vec();
        for condition in &mut conditions {
            condition.id = state.next_id();
            condition.filter_id = filter_id;
        }
        let mut actions = actions.to_vec();
        for action in &mut actions {
            action.id = state.next_id();
            action.filter_id = filter_id;
        }
        if let Some(def) = state.filters.get_mut(&filter_id) {
            def.conditions = conditions;
            def.actions = actions;
        }
        state.writes.push(StoreWrite::ReplaceFilterRules(filter_id));
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<DbId>, CoreError> {
        Ok(self.state().users.iter().copied().collect())
    }

    async fn mark_read(&self, user_id: DbId, event_ids: &[DbId]) -> Result<u64, CoreError> {
        let mut state = self.state();
        let mut affected = 0;
        for &event_id in event_ids {
            if state.reads.insert((user_id, event_id)) {
                affected += 1;
            }
        }
        state.writes.push(StoreWrite::MarkRead {
            user_id,
            ids: event_ids.to_vec(),
        });
        Ok(affected)
    }

    async fn mark_unread(&self, user_id: DbId, event_ids: &[DbId]) -> Result<u64, CoreError> {
        let mut state = self.state();
        let mut affected = 0;
        for &event_id in event_ids {
            if state.reads.remove(&(user_id, event_id)) {
                affected += 1;
            }
        }
        state.writes.push(StoreWrite::MarkUnread {
            user_id,
            ids: event_ids.to_vec(),
        });
        Ok(affected)
    }

    async fn read_event_ids(&self, user_id: DbId) -> Result<Vec<DbId>, CoreError> {
        Ok(self
            .state()
            .reads
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|&(_, event_id)| event_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::event::EventType;

    #[tokio::test]
    async fn stored_events_come_back_without_tags() {
        let store = MemoryStore::new();
        let mut event = Event::new(EventType::Error, "Crash", "boom", 10);
        event.set_tag("host", "web-01").unwrap();
        let id = store.insert_event(&event).await.unwrap();

        let fetched = store.get_event(id).await.unwrap().unwrap();
        assert!(!fetched.tags_loaded());
        assert_eq!(store.load_tags(id).await.unwrap().get("HOST"), Some("web-01"));
        assert_eq!(store.tag_loads(), 1);
    }

    #[tokio::test]
    async fn stream_filters_by_folder() {
        let store = MemoryStore::new();
        let folder = store.add_folder(0, "Inbox").await.unwrap();
        let mut event = Event::new(EventType::Info, "Start", "up", 0);
        store.insert_event(&event).await.unwrap();
        event.folder_id = folder;
        let in_folder = store.insert_event(&event).await.unwrap();

        let all: Vec<_> = store.stream_events(None).collect().await;
        assert_eq!(all.len(), 2);
        let scoped: Vec<DbId> = store
            .stream_events(Some(folder))
            .map(|e| e.unwrap().id)
            .collect()
            .await;
        assert_eq!(scoped, vec![in_folder]);
    }

    #[tokio::test]
    async fn list_folders_always_includes_root() {
        let store = MemoryStore::new();
        let folders = store.list_folders().await.unwrap();
        assert_eq!(folders, vec![Folder::root()]);
        assert_eq!(store.folder_list_calls(), 1);
    }

    #[tokio::test]
    async fn events_between_is_half_open() {
        let store = MemoryStore::new();
        for date in [5, 10, 20] {
            store
                .insert_event(&Event::new(EventType::Debug, "t", "m", date))
                .await
                .unwrap();
        }
        let dates: Vec<EpochMillis> = store
            .events_between(5, 20)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec![5, 10]);
    }

    #[tokio::test]
    async fn read_state_is_per_user_and_dropped_with_the_event() {
        let store = MemoryStore::new();
        let id = store
            .insert_event(&Event::new(EventType::Info, "t", "m", 0))
            .await
            .unwrap();
        store.mark_read(1, &[id]).await.unwrap();
        assert!(store.is_read(1, id));
        assert!(!store.is_read(2, id));
        assert_eq!(store.read_event_ids(1).await.unwrap(), vec![id]);

        store.delete_events(&[id]).await.unwrap();
        assert!(store.read_event_ids(1).await.unwrap().is_empty());
    }
}
