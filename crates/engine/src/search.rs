//! Free-text and advanced search over streamed events.

use futures::StreamExt;
use triage_core::condition::validate_condition;
use triage_core::error::CoreError;
use triage_core::event::Event;
use triage_core::search::{matches_free_text, AdvancedSearch, SearchQuery};
use triage_core::store::EventStore;
use triage_core::types::DbId;

use crate::context::RunContext;
use crate::engine::FilterEngine;

impl<S: EventStore> FilterEngine<S> {
    /// Events whose message, type, subtype or any tag value contains the
    /// query text (case-insensitively), in id order.
    ///
    /// Tags are only fetched for events that did not already match on their
    /// built-in fields.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Event>, CoreError> {
        self.ensure_search_scope(query.folder_id).await?;

        let store = self.store();
        let mut found = Vec::new();
        let mut events = store.stream_events(query.folder_id);
        while let Some(event) = events.next().await {
            let mut event = event?;
            if matches_free_text(&event, &query.text) {
                found.push(event);
                continue;
            }
            if !event.tags_loaded() {
                event.tags = Some(store.load_tags(event.id).await?);
                if matches_free_text(&event, &query.text) {
                    found.push(event);
                }
            }
        }
        tracing::debug!(query = %query.text, hits = found.len(), "Search finished");
        Ok(found)
    }

    /// Events satisfying filter-style conditions. Nothing is written.
    pub async fn advanced_search(&self, search: &AdvancedSearch) -> Result<Vec<Event>, CoreError> {
        for condition in &search.conditions {
            validate_condition(condition)?;
        }
        self.ensure_search_scope(search.folder_id).await?;

        let store = self.store();
        let mut ctx = RunContext::load(store).await?;
        let needs_tags = search.needs_tags();
        let mut found = Vec::new();
        let mut events = store.stream_events(search.folder_id);
        while let Some(event) = events.next().await {
            let mut event = event?;
            if needs_tags && !event.tags_loaded() {
                event.tags = Some(store.load_tags(event.id).await?);
            }
            if search.matches(&mut ctx.evaluator, &event, &ctx.folders)? {
                found.push(event);
            }
        }
        tracing::debug!(
            conditions = search.conditions.len(),
            hits = found.len(),
            "Advanced search finished",
        );
        Ok(found)
    }

    async fn ensure_search_scope(&self, folder_id: Option<DbId>) -> Result<(), CoreError> {
        let Some(folder_id) = folder_id else {
            return Ok(());
        };
        if !self.folder_tree().await?.contains(folder_id) {
            return Err(CoreError::NotFound {
                entity: "folder",
                id: folder_id,
            });
        }
        Ok(())
    }
}
