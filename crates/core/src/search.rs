//! Free-text and advanced search helpers.
//!
//! This module lives in `core` (no storage access) so the engine can stream
//! events from any backend and decide matches here.

use serde::{Deserialize, Serialize};

use crate::condition::{requires_tags, ConditionEvaluator};
use crate::error::CoreError;
use crate::event::Event;
use crate::filter::{ConditionHandling, FilterCondition};
use crate::folder::FolderTree;
use crate::types::DbId;

/// A free-text search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    /// Restrict to one folder; `None` searches the whole project.
    pub folder_id: Option<DbId>,
}

/// An advanced search request: filter-style conditions without actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedSearch {
    pub conditions: Vec<FilterCondition>,
    /// `true` requires every condition, `false` any one of them.
    pub match_all: bool,
    pub folder_id: Option<DbId>,
}

impl AdvancedSearch {
    pub fn handling(&self) -> ConditionHandling {
        if self.match_all {
            ConditionHandling::All
        } else {
            ConditionHandling::Any
        }
    }

    /// Whether any enabled condition reads a tag.
    pub fn needs_tags(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.enabled && requires_tags(&c.field))
    }

    /// Test one event. Tags must already be attached if [`needs_tags`] is true.
    ///
    /// [`needs_tags`]: AdvancedSearch::needs_tags
    pub fn matches(
        &self,
        evaluator: &mut ConditionEvaluator,
        event: &Event,
        folders: &FolderTree,
    ) -> Result<bool, CoreError> {
        evaluator.evaluate_all(self.handling(), &self.conditions, event, folders)
    }
}

/// Whether `query` occurs (case-insensitively) in the message, type name,
/// subtype, or any tag value. An empty query matches everything.
pub fn matches_free_text(event: &Event, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let hit = |haystack: &str| haystack.to_lowercase().contains(&needle);
    hit(&event.message)
        || hit(event.event_type.as_str())
        || hit(&event.subtype)
        || event
            .tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| hit(&t.value)))
}
