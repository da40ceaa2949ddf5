#![allow(dead_code)]

use triage_core::event::{Event, EventType};
use triage_core::filter::{ConditionHandling, FilterAction, FilterCondition, FilterSpec};
use triage_core::store::EventStore;
use triage_core::types::DbId;
use triage_engine::{FilterEngine, MemoryStore};

pub fn new_engine() -> FilterEngine<MemoryStore> {
    FilterEngine::new(MemoryStore::new())
}

pub fn spec(name: &str, handling: ConditionHandling, sort_order: i32) -> FilterSpec {
    FilterSpec {
        name: name.to_string(),
        enabled: true,
        condition_handling: handling,
        sort_order,
    }
}

/// Create an enabled filter through the filter service and attach its rules.
pub async fn add_filter(
    engine: &FilterEngine<MemoryStore>,
    name: &str,
    handling: ConditionHandling,
    sort_order: i32,
    conditions: Vec<FilterCondition>,
    actions: Vec<FilterAction>,
) -> DbId {
    let filter = engine
        .create_filter(&spec(name, handling, sort_order))
        .await
        .unwrap();
    engine
        .replace_filter_rules(filter.id, conditions, actions)
        .await
        .unwrap();
    filter.id
}

/// Store an event directly, without running filters.
pub async fn put_event(
    engine: &FilterEngine<MemoryStore>,
    subtype: &str,
    message: &str,
    folder_id: DbId,
    tags: &[(&str, &str)],
) -> DbId {
    let mut event = Event::new(EventType::Error, subtype, message, 1_700_000_000_000);
    event.folder_id = folder_id;
    for (key, value) in tags {
        event.set_tag(key, *value).unwrap();
    }
    event.prepare_for_insert();
    engine.store().insert_event(&event).await.unwrap()
}
