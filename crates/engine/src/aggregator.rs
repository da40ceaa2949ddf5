//! Deferred action aggregator.
//!
//! Executing an action only records its intended storage effect (and applies
//! it to the in-memory event so later filters in the same pass see it). The
//! recorded effects are written by [`DeferredActions::flush`] as one batched
//! call per distinct outcome, so a bulk run costs O(distinct outcomes)
//! storage writes rather than O(events).

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use triage_core::error::CoreError;
use triage_core::event::{parse_color, Event};
use triage_core::filter::{ActionOperator, FilterAction};
use triage_core::folder::FolderTree;
use triage_core::store::EventStore;
use triage_core::types::DbId;

/// What the caller should do after an action ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Continue,
    /// Stop evaluating filters against this event.
    Halt,
}

/// Counts of what a flush wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub move_calls: usize,
    pub events_moved: usize,
    pub color_calls: usize,
    pub events_recolored: usize,
    pub delete_calls: usize,
    pub events_deleted: usize,
    pub read_state_calls: usize,
    pub events_marked_read: usize,
    pub events_marked_unread: usize,
}

impl FlushSummary {
    /// Total storage write calls issued.
    pub fn calls(&self) -> usize {
        self.move_calls + self.color_calls + self.delete_calls + self.read_state_calls
    }
}

/// Latest intended effect per event, per action kind.
#[derive(Debug, Default)]
pub struct DeferredActions {
    moves: HashMap<DbId, DbId>,
    colors: HashMap<DbId, u32>,
    deletions: HashSet<DbId>,
    read_states: HashMap<DbId, bool>,
}

/// Group `event -> value` entries by value, dropping deleted events. Ids are
/// sorted so batches are deterministic.
fn group_by_value<V>(entries: HashMap<DbId, V>, deleted: &HashSet<DbId>) -> BTreeMap<V, Vec<DbId>>
where
    V: Ord,
{
    let mut groups: BTreeMap<V, Vec<DbId>> = BTreeMap::new();
    for (event_id, value) in entries {
        if !deleted.contains(&event_id) {
            groups.entry(value).or_default().push(event_id);
        }
    }
    for ids in groups.values_mut() {
        ids.sort_unstable();
    }
    groups
}

impl DeferredActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
            && self.colors.is_empty()
            && self.deletions.is_empty()
            && self.read_states.is_empty()
    }

    pub fn is_deleted(&self, event_id: DbId) -> bool {
        self.deletions.contains(&event_id)
    }

    /// Pending target folder for an event, if a `MoveTo` ran against it.
    pub fn pending_folder(&self, event_id: DbId) -> Option<DbId> {
        self.moves.get(&event_id).copied()
    }

    pub fn pending_color(&self, event_id: DbId) -> Option<u32> {
        self.colors.get(&event_id).copied()
    }

    pub fn pending_read_state(&self, event_id: DbId) -> Option<bool> {
        self.read_states.get(&event_id).copied()
    }

    /// Record `action` against `event` and apply its in-memory effect.
    ///
    /// `MoveTo` resolves its path in `folders`; an unknown path is an error.
    /// `Delete` and `StopExecution` return [`ActionOutcome::Halt`].
    pub fn execute(
        &mut self,
        action: &FilterAction,
        event: &mut Event,
        folders: &FolderTree,
    ) -> Result<ActionOutcome, CoreError> {
        match action.operator {
            ActionOperator::MoveTo => {
                let target = folders.resolve_path(&action.argument).ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Target folder '{}' does not exist",
                        action.argument
                    ))
                })?;
                event.folder_id = target.id;
                self.moves.insert(event.id, target.id);
            }
            ActionOperator::SetColor => {
                let color = parse_color(&action.argument)?;
                event.color = color;
                self.colors.insert(event.id, color);
            }
            ActionOperator::MarkRead => {
                self.read_states.insert(event.id, true);
            }
            ActionOperator::MarkUnread => {
                self.read_states.insert(event.id, false);
            }
            ActionOperator::Delete => {
                self.deletions.insert(event.id);
            }
            ActionOperator::StopExecution => {}
        }
        if action.operator.is_terminal() {
            Ok(ActionOutcome::Halt)
        } else {
            Ok(ActionOutcome::Continue)
        }
    }

    /// Write every recorded effect to `store` and reset.
    ///
    /// Moves and colors issue one call per distinct target; deletions one
    /// call in total; read state one call per user per distinct state, for
    /// every user on the system. Deleted events are left out of every other
    /// batch. The recorded effects are cleared before any write is issued,
    /// so the aggregator is empty afterwards even if a write fails.
    ///
    /// A failed batch does not stop the others: each failure is logged and
    /// the first one is returned once every batch has been attempted.
    pub async fn flush<S>(&mut self, store: &S) -> Result<FlushSummary, CoreError>
    where
        S: EventStore + ?Sized,
    {
        let Self {
            moves,
            colors,
            deletions,
            read_states,
        } = std::mem::take(self);
        let mut summary = FlushSummary::default();
        let mut first_error: Option<CoreError> = None;

        for (folder_id, ids) in group_by_value(moves, &deletions) {
            match store.move_events(&ids, folder_id).await {
                Ok(_) => {
                    summary.move_calls += 1;
                    summary.events_moved += ids.len();
                }
                Err(e) => record_failure(&mut first_error, "move", ids.len(), e),
            }
        }

        for (color, ids) in group_by_value(colors, &deletions) {
            match store.set_events_color(&ids, color).await {
                Ok(_) => {
                    summary.color_calls += 1;
                    summary.events_recolored += ids.len();
                }
                Err(e) => record_failure(&mut first_error, "color", ids.len(), e),
            }
        }

        if !deletions.is_empty() {
            let mut ids: Vec<DbId> = deletions.iter().copied().collect();
            ids.sort_unstable();
            match store.delete_events(&ids).await {
                Ok(_) => {
                    summary.delete_calls += 1;
                    summary.events_deleted += ids.len();
                }
                Err(e) => record_failure(&mut first_error, "delete", ids.len(), e),
            }
        }

        let read_groups = group_by_value(read_states, &deletions);
        if !read_groups.is_empty() {
            // Read state is applied for every account, not just the caller.
            match store.list_user_ids().await {
                Ok(users) => {
                    for (read, ids) in &read_groups {
                        let mut written = false;
                        for &user_id in &users {
                            let result = if *read {
                                store.mark_read(user_id, ids).await
                            } else {
                                store.mark_unread(user_id, ids).await
                            };
                            match result {
                                Ok(_) => {
                                    summary.read_state_calls += 1;
                                    written = true;
                                }
                                Err(e) => {
                                    record_failure(&mut first_error, "read_state", ids.len(), e)
                                }
                            }
                        }
                        if !written {
                            continue;
                        }
                        if *read {
                            summary.events_marked_read += ids.len();
                        } else {
                            summary.events_marked_unread += ids.len();
                        }
                    }
                }
                Err(e) => {
                    let pending = read_groups.values().map(Vec::len).sum();
                    record_failure(&mut first_error, "read_state", pending, e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

fn record_failure(
    first_error: &mut Option<CoreError>,
    batch: &'static str,
    events: usize,
    err: CoreError,
) {
    tracing::error!(batch, events, error = %err, "Deferred write failed");
    first_error.get_or_insert(err);
}
