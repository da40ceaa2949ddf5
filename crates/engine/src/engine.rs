//! Filter engine: runs filters against one event, a folder, or a project.
//!
//! Every run follows the same discipline:
//!
//! 1. Load and select filters (skip disabled and unsatisfiable ones).
//! 2. Load the run's [`RunContext`] (folder snapshot, regex cache).
//! 3. For each event, evaluate filters in ascending sort order; a satisfied
//!    filter executes its enabled actions through [`DeferredActions`]; a
//!    terminal action stops further filters for that event.
//! 4. Flush the aggregator exactly once.
//!
//! Errors raised by one filter against one event are logged and counted;
//! they never abort the run.

use std::fmt;

use futures::StreamExt;
use serde::Serialize;
use tracing::Instrument;
use triage_core::condition::requires_tags;
use triage_core::error::CoreError;
use triage_core::event::Event;
use triage_core::filter::{ConditionHandling, FilterDefinition};
use triage_core::store::EventStore;
use triage_core::types::DbId;

use crate::aggregator::{ActionOutcome, DeferredActions, FlushSummary};
use crate::context::RunContext;

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Filters that passed the selection guard.
    pub filters_selected: usize,
    /// Filters dropped by the selection guard.
    pub filters_skipped: usize,
    pub events_seen: usize,
    /// (filter, event) pairs whose conditions were satisfied.
    pub filters_applied: usize,
    /// Events whose evaluation was stopped by a terminal action.
    pub events_halted: usize,
    /// (filter, event) pairs that failed.
    pub errors: usize,
    pub flush: FlushSummary,
}

/// Result of evaluating one filter against one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOutcome {
    NotMatched,
    Applied,
    Halted,
}

/// Which events a run covers.
#[derive(Debug)]
enum RunTarget {
    Event(Box<Event>),
    Folder(DbId),
    All,
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTarget::Event(event) => write!(f, "event {}", event.id),
            RunTarget::Folder(id) => write!(f, "folder {id}"),
            RunTarget::All => f.write_str("all events"),
        }
    }
}

/// Keep runnable filters (and enabled ones unless `force`), in run order.
fn select_filters(
    filters: Vec<FilterDefinition>,
    force: bool,
    report: &mut RunReport,
) -> Vec<FilterDefinition> {
    let mut selected: Vec<FilterDefinition> = filters
        .into_iter()
        .filter(|def| {
            let keep = (def.filter.enabled || force) && def.is_runnable();
            if !keep {
                tracing::debug!(
                    filter_id = def.filter.id,
                    enabled = def.filter.enabled,
                    "Skipping filter that is disabled or cannot match",
                );
                report.filters_skipped += 1;
            }
            keep
        })
        .collect();
    selected.sort_by_key(|def| (def.filter.sort_order, def.filter.id));
    report.filters_selected = selected.len();
    selected
}

/// Evaluates filters against events for one project.
///
/// An engine owns one storage handle and is not meant to be shared: every
/// run entry point takes `&mut self`. Create one engine per worker.
pub struct FilterEngine<S> {
    store: S,
    actions: DeferredActions,
}

impl<S: EventStore> FilterEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            actions: DeferredActions::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Run one filter against one event. `force` runs it even if disabled.
    pub async fn run_filter_on_event(
        &mut self,
        filter_id: DbId,
        event_id: DbId,
        force: bool,
    ) -> Result<RunReport, CoreError> {
        let filters = vec![self.require_filter(filter_id).await?];
        let event = self.require_event(event_id).await?;
        self.execute(filters, force, RunTarget::Event(Box::new(event)))
            .await
            .map(|(report, _)| report)
    }

    /// Run one filter against every event in a folder.
    pub async fn run_filter_on_folder(
        &mut self,
        filter_id: DbId,
        folder_id: DbId,
        force: bool,
    ) -> Result<RunReport, CoreError> {
        let filters = vec![self.require_filter(filter_id).await?];
        self.execute(filters, force, RunTarget::Folder(folder_id))
            .await
            .map(|(report, _)| report)
    }

    /// Run one filter against every event in the project.
    pub async fn run_filter_on_all(
        &mut self,
        filter_id: DbId,
        force: bool,
    ) -> Result<RunReport, CoreError> {
        let filters = vec![self.require_filter(filter_id).await?];
        self.execute(filters, force, RunTarget::All)
            .await
            .map(|(report, _)| report)
    }

    /// Run every enabled filter against one event.
    pub async fn run_filters_on_event(&mut self, event_id: DbId) -> Result<RunReport, CoreError> {
        let filters = self.store.load_filters().await?;
        let event = self.require_event(event_id).await?;
        self.execute(filters, false, RunTarget::Event(Box::new(event)))
            .await
            .map(|(report, _)| report)
    }

    /// Run every enabled filter against every event in a folder.
    pub async fn run_filters_on_folder(
        &mut self,
        folder_id: DbId,
    ) -> Result<RunReport, CoreError> {
        let filters = self.store.load_filters().await?;
        self.execute(filters, false, RunTarget::Folder(folder_id))
            .await
            .map(|(report, _)| report)
    }

    /// Run every enabled filter against every event in the project.
    ///
    /// Events are streamed; this is the expensive administrative operation.
    pub async fn run_filters_on_all(&mut self) -> Result<RunReport, CoreError> {
        let filters = self.store.load_filters().await?;
        self.execute(filters, false, RunTarget::All)
            .await
            .map(|(report, _)| report)
    }

    /// Insert a new event and run every enabled filter against it.
    ///
    /// Placeholders and the hash are applied before the insert. Returns the
    /// event as it stands after the filters ran (folder and color reflect the
    /// actions); `report.flush.events_deleted` is 1 if a filter deleted it.
    pub async fn add_event(&mut self, mut event: Event) -> Result<(Event, RunReport), CoreError> {
        event.prepare_for_insert();
        event.id = self.store.insert_event(&event).await?;
        tracing::debug!(
            event_id = event.id,
            hash = %event.hash,
            event_type = %event.event_type,
            "Event inserted",
        );

        let filters = self.store.load_filters().await?;
        let (report, event) = self
            .execute(filters, false, RunTarget::Event(Box::new(event)))
            .await?;
        let event = event.ok_or_else(|| {
            CoreError::Internal("single-event run did not return its event".to_string())
        })?;
        Ok((event, report))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn require_filter(&self, filter_id: DbId) -> Result<FilterDefinition, CoreError> {
        self.store
            .load_filter(filter_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "filter",
                id: filter_id,
            })
    }

    async fn require_event(&self, event_id: DbId) -> Result<Event, CoreError> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "event",
                id: event_id,
            })
    }

    async fn execute(
        &mut self,
        filters: Vec<FilterDefinition>,
        force: bool,
        target: RunTarget,
    ) -> Result<(RunReport, Option<Event>), CoreError> {
        let span = tracing::info_span!("filter_run", target = %target, force);
        self.execute_inner(filters, force, target)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &mut self,
        filters: Vec<FilterDefinition>,
        force: bool,
        target: RunTarget,
    ) -> Result<(RunReport, Option<Event>), CoreError> {
        let mut report = RunReport::default();
        let filters = select_filters(filters, force, &mut report);
        let mut ctx = RunContext::load(&self.store).await?;

        let Self { store, actions } = self;
        let mut single = None;
        let evaluated: Result<(), CoreError> = match target {
            RunTarget::Event(mut event) => {
                apply_filters(store, actions, &mut ctx, &filters, &mut event, &mut report).await;
                single = Some(*event);
                Ok(())
            }
            RunTarget::Folder(folder_id) if !ctx.folders.contains(folder_id) => {
                Err(CoreError::NotFound {
                    entity: "folder",
                    id: folder_id,
                })
            }
            RunTarget::Folder(folder_id) => {
                stream_filters(store, actions, &mut ctx, &filters, Some(folder_id), &mut report)
                    .await
            }
            RunTarget::All => {
                stream_filters(store, actions, &mut ctx, &filters, None, &mut report).await
            }
        };

        // Flush whatever was recorded even if the event stream failed.
        report.flush = actions.flush(&*store).await?;
        evaluated?;

        tracing::info!(
            filters = report.filters_selected,
            events = report.events_seen,
            applied = report.filters_applied,
            errors = report.errors,
            write_calls = report.flush.calls(),
            "Filter run finished",
        );
        Ok((report, single))
    }
}

/// Evaluate `filters` against every streamed event.
async fn stream_filters<S>(
    store: &S,
    actions: &mut DeferredActions,
    ctx: &mut RunContext,
    filters: &[FilterDefinition],
    folder_id: Option<DbId>,
    report: &mut RunReport,
) -> Result<(), CoreError>
where
    S: EventStore + ?Sized,
{
    if filters.is_empty() {
        return Ok(());
    }
    let mut events = store.stream_events(folder_id);
    while let Some(event) = events.next().await {
        let mut event = event?;
        apply_filters(store, actions, ctx, filters, &mut event, report).await;
    }
    Ok(())
}

/// Evaluate `filters` in order against one event until one halts.
async fn apply_filters<S>(
    store: &S,
    actions: &mut DeferredActions,
    ctx: &mut RunContext,
    filters: &[FilterDefinition],
    event: &mut Event,
    report: &mut RunReport,
) where
    S: EventStore + ?Sized,
{
    report.events_seen += 1;
    for def in filters {
        match apply_filter(store, actions, ctx, def, event).await {
            Ok(FilterOutcome::NotMatched) => {}
            Ok(FilterOutcome::Applied) => report.filters_applied += 1,
            Ok(FilterOutcome::Halted) => {
                report.filters_applied += 1;
                report.events_halted += 1;
                break;
            }
            Err(e) => {
                report.errors += 1;
                tracing::error!(
                    filter_id = def.filter.id,
                    event_id = event.id,
                    error = %e,
                    "Filter failed for event",
                );
            }
        }
    }
}

/// Evaluate one filter against one event and execute its actions if it
/// matches. Tags are loaded from storage the first time a condition needs
/// them; the loaded set stays on the event for the rest of the run.
async fn apply_filter<S>(
    store: &S,
    actions: &mut DeferredActions,
    ctx: &mut RunContext,
    def: &FilterDefinition,
    event: &mut Event,
) -> Result<FilterOutcome, CoreError>
where
    S: EventStore + ?Sized,
{
    let handling = def.filter.condition_handling;
    let needs_tags = handling != ConditionHandling::Unconditional
        && def.enabled_conditions().any(|c| requires_tags(&c.field));
    if needs_tags && !event.tags_loaded() {
        event.tags = Some(store.load_tags(event.id).await?);
    }

    let satisfied = ctx
        .evaluator
        .evaluate_all(handling, &def.conditions, event, &ctx.folders)?;
    if !satisfied {
        return Ok(FilterOutcome::NotMatched);
    }

    for action in def.enabled_actions() {
        if actions.execute(action, event, &ctx.folders)? == ActionOutcome::Halt {
            tracing::debug!(
                filter_id = def.filter.id,
                event_id = event.id,
                action = %action.operator,
                "Filter evaluation halted",
            );
            return Ok(FilterOutcome::Halted);
        }
    }
    Ok(FilterOutcome::Applied)
}
