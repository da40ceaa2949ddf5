//! Folder service, filter service, and search.

mod common;

use assert_matches::assert_matches;
use common::{add_filter, new_engine, put_event, spec};
use triage_core::error::CoreError;
use triage_core::filter::{
    ActionOperator, ConditionHandling, ConditionOperator, FilterAction, FilterCondition,
};
use triage_core::folder::Folder;
use triage_core::search::{AdvancedSearch, SearchQuery};
use triage_core::types::ROOT_FOLDER_ID;
use triage_engine::StoreWrite;

// ---------------------------------------------------------------------------
// Folders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_resolve_folders() {
    let engine = new_engine();
    let a = engine.add_folder(ROOT_FOLDER_ID, "a").await.unwrap();
    let b = engine.add_folder(a, "b").await.unwrap();

    assert_eq!(engine.resolve_folder("a/b").await.unwrap(), Some(b));
    assert_eq!(engine.resolve_folder("/A/B/").await.unwrap(), Some(b));
    assert_eq!(engine.resolve_folder("a/c").await.unwrap(), None);
    assert_eq!(engine.resolve_folder("a//b").await.unwrap(), None);
    assert_eq!(engine.resolve_folder("/").await.unwrap(), Some(ROOT_FOLDER_ID));
    assert_eq!(
        engine.folder_tree().await.unwrap().path_of(b).as_deref(),
        Some("/a/b")
    );
}

#[tokio::test]
async fn sibling_names_collide_case_insensitively() {
    let engine = new_engine();
    engine.add_folder(ROOT_FOLDER_ID, "Inbox").await.unwrap();
    assert_matches!(
        engine.add_folder(ROOT_FOLDER_ID, "INBOX").await,
        Err(CoreError::Conflict(_))
    );
    assert_matches!(
        engine.add_folder(ROOT_FOLDER_ID, "bad/name").await,
        Err(CoreError::Validation(_))
    );
    assert_matches!(
        engine.add_folder(99, "Orphan").await,
        Err(CoreError::NotFound { entity: "folder", id: 99 })
    );
}

#[tokio::test]
async fn moving_into_own_subtree_is_rejected_without_writes() {
    let engine = new_engine();
    let a = engine.add_folder(ROOT_FOLDER_ID, "a").await.unwrap();
    let b = engine.add_folder(a, "b").await.unwrap();
    let c = engine.add_folder(b, "c").await.unwrap();
    engine.store().clear_writes();

    assert_matches!(engine.move_folder(a, c).await, Err(CoreError::Validation(_)));
    assert_matches!(engine.move_folder(a, a).await, Err(CoreError::Validation(_)));
    assert_matches!(
        engine.move_folder(ROOT_FOLDER_ID, a).await,
        Err(CoreError::Validation(_))
    );
    assert!(engine.store().writes().is_empty());

    engine.move_folder(c, ROOT_FOLDER_ID).await.unwrap();
    assert_eq!(
        engine.store().writes(),
        vec![StoreWrite::MoveFolder {
            id: c,
            parent_id: ROOT_FOLDER_ID
        }]
    );
    assert_eq!(engine.resolve_folder("/c").await.unwrap(), Some(c));
}

#[tokio::test]
async fn moving_to_current_parent_is_a_no_op() {
    let engine = new_engine();
    let a = engine.add_folder(ROOT_FOLDER_ID, "a").await.unwrap();
    engine.store().clear_writes();

    engine.move_folder(a, ROOT_FOLDER_ID).await.unwrap();
    assert!(engine.store().writes().is_empty());
}

#[tokio::test]
async fn rename_allows_case_change_of_own_name() {
    let engine = new_engine();
    let a = engine.add_folder(ROOT_FOLDER_ID, "logs").await.unwrap();
    engine.add_folder(ROOT_FOLDER_ID, "Archive").await.unwrap();

    engine.rename_folder(a, "Logs").await.unwrap();
    assert_eq!(engine.resolve_folder("/Logs").await.unwrap(), Some(a));
    assert_matches!(
        engine.rename_folder(a, "archive").await,
        Err(CoreError::Conflict(_))
    );
    assert_matches!(
        engine.rename_folder(ROOT_FOLDER_ID, "top").await,
        Err(CoreError::Validation(_))
    );
}

#[tokio::test]
async fn only_empty_folders_can_be_deleted() {
    let engine = new_engine();
    let parent = engine.add_folder(ROOT_FOLDER_ID, "parent").await.unwrap();
    let child = engine.add_folder(parent, "child").await.unwrap();
    put_event(&engine, "Crash", "boom", child, &[]).await;

    assert_matches!(engine.delete_folder(parent).await, Err(CoreError::Validation(_)));
    assert_matches!(
        engine.delete_folder(child).await,
        Err(CoreError::Validation(msg)) if msg.contains("1 event")
    );
    assert_matches!(
        engine.delete_folder(ROOT_FOLDER_ID).await,
        Err(CoreError::Validation(_))
    );

    let empty = engine.add_folder(parent, "empty").await.unwrap();
    engine.delete_folder(empty).await.unwrap();
    assert_eq!(engine.resolve_folder("/parent/empty").await.unwrap(), None);
}

#[tokio::test]
async fn corrupted_hierarchy_fails_runs_and_folder_operations() {
    let mut engine = new_engine();
    engine.store().put_folder(Folder {
        id: 1,
        parent_id: 2,
        name: "one".into(),
    });
    engine.store().put_folder(Folder {
        id: 2,
        parent_id: 1,
        name: "two".into(),
    });

    assert_matches!(
        engine.folder_tree().await,
        Err(CoreError::CircularReference { .. })
    );
    assert_matches!(
        engine.add_folder(ROOT_FOLDER_ID, "new").await,
        Err(CoreError::CircularReference { .. })
    );
    assert_matches!(
        engine.run_filters_on_all().await,
        Err(CoreError::CircularReference { .. })
    );
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn filter_names_are_unique_case_insensitively() {
    let engine = new_engine();
    let first = engine
        .create_filter(&spec("Crashes", ConditionHandling::All, 1))
        .await
        .unwrap();
    assert_matches!(
        engine
            .create_filter(&spec("crashes", ConditionHandling::Any, 2))
            .await,
        Err(CoreError::Conflict(_))
    );
    assert_matches!(
        engine.create_filter(&spec(" padded", ConditionHandling::Any, 2)).await,
        Err(CoreError::Validation(_))
    );

    let renamed = engine
        .update_filter(first.id, &spec("CRASHES", ConditionHandling::Any, 5))
        .await
        .unwrap();
    assert_eq!(renamed.name, "CRASHES");
    assert_eq!(renamed.condition_handling, ConditionHandling::Any);
    assert_matches!(
        engine
            .update_filter(999, &spec("Other", ConditionHandling::Any, 5))
            .await,
        Err(CoreError::NotFound { entity: "filter", .. })
    );
}

#[tokio::test]
async fn list_filters_in_run_order() {
    let engine = new_engine();
    let late = add_filter(&engine, "late", ConditionHandling::Unconditional, 10, vec![], vec![]).await;
    let early = add_filter(&engine, "early", ConditionHandling::Unconditional, -1, vec![], vec![]).await;

    let ids: Vec<_> = engine
        .list_filters()
        .await
        .unwrap()
        .into_iter()
        .map(|def| def.filter.id)
        .collect();
    assert_eq!(ids, vec![early, late]);

    engine.delete_filter(late).await.unwrap();
    assert_matches!(
        engine.delete_filter(late).await,
        Err(CoreError::NotFound { entity: "filter", .. })
    );
    assert_matches!(engine.get_filter(late).await, Err(CoreError::NotFound { .. }));
}

#[tokio::test]
async fn rules_of_another_filter_are_rejected() {
    let engine = new_engine();
    let mine = add_filter(&engine, "mine", ConditionHandling::All, 1, vec![], vec![]).await;
    let theirs = add_filter(&engine, "theirs", ConditionHandling::All, 2, vec![], vec![]).await;
    engine.store().clear_writes();

    let mut foreign = FilterCondition::new("message", ConditionOperator::Contains, "x");
    foreign.id = 42;
    foreign.filter_id = theirs;
    assert_matches!(
        engine.replace_filter_rules(mine, vec![foreign], vec![]).await,
        Err(CoreError::Validation(_))
    );

    let mut foreign_action = FilterAction::new(ActionOperator::Delete, "");
    foreign_action.filter_id = theirs;
    assert_matches!(
        engine.replace_filter_rules(mine, vec![], vec![foreign_action]).await,
        Err(CoreError::Validation(_))
    );
    assert!(engine.store().writes().is_empty());

    let saved = engine
        .replace_filter_rules(
            mine,
            vec![FilterCondition::new("host", ConditionOperator::Equals, "web")],
            vec![FilterAction::new(ActionOperator::MarkRead, "")],
        )
        .await
        .unwrap();
    assert_eq!(saved.conditions.len(), 1);
    assert!(saved.conditions.iter().all(|c| c.filter_id == mine && c.id != 0));
    assert!(saved.actions.iter().all(|a| a.filter_id == mine));
}

#[tokio::test]
async fn invalid_rules_are_rejected_at_save_time() {
    let engine = new_engine();
    let filter = add_filter(&engine, "f", ConditionHandling::All, 1, vec![], vec![]).await;

    assert_matches!(
        engine
            .replace_filter_rules(
                filter,
                vec![FilterCondition::new("message", ConditionOperator::Equals, "(unclosed").with_regex()],
                vec![],
            )
            .await,
        Err(CoreError::InvalidPattern { .. })
    );
    assert_matches!(
        engine
            .replace_filter_rules(
                filter,
                vec![],
                vec![FilterAction::new(ActionOperator::SetColor, "not a color")],
            )
            .await,
        Err(CoreError::Validation(_))
    );
    assert_matches!(
        engine
            .replace_filter_rules(
                filter,
                vec![FilterCondition::new("bad\u{7}key", ConditionOperator::Equals, "x")],
                vec![],
            )
            .await,
        Err(CoreError::Validation(_))
    );
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn free_text_search_checks_tags_only_when_needed() {
    let engine = new_engine();
    let inbox = engine.add_folder(ROOT_FOLDER_ID, "Inbox").await.unwrap();
    let by_message = put_event(&engine, "Crash", "disk full on web-01", ROOT_FOLDER_ID, &[]).await;
    let by_tag = put_event(&engine, "Crash", "boom", inbox, &[("host", "WEB-01")]).await;
    put_event(&engine, "Timeout", "slow", ROOT_FOLDER_ID, &[("host", "db-01")]).await;

    let hits: Vec<_> = engine
        .search(&SearchQuery {
            text: "web-01".to_string(),
            folder_id: None,
        })
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(hits, vec![by_message, by_tag]);
    assert_eq!(engine.store().tag_loads(), 2);

    let scoped = engine
        .search(&SearchQuery {
            text: "web".to_string(),
            folder_id: Some(inbox),
        })
        .await
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, by_tag);

    assert_matches!(
        engine
            .search(&SearchQuery {
                text: "x".to_string(),
                folder_id: Some(404),
            })
            .await,
        Err(CoreError::NotFound { entity: "folder", .. })
    );
}

#[tokio::test]
async fn advanced_search_writes_nothing() {
    let engine = new_engine();
    let web = put_event(&engine, "Crash", "a", ROOT_FOLDER_ID, &[("host", "web-01")]).await;
    let db = put_event(&engine, "Crash", "b", ROOT_FOLDER_ID, &[("host", "db-01")]).await;
    put_event(&engine, "Timeout", "c", ROOT_FOLDER_ID, &[]).await;
    engine.store().clear_writes();

    let mut search = AdvancedSearch {
        conditions: vec![
            FilterCondition::new("subtype", ConditionOperator::Equals, "crash"),
            FilterCondition::new("host", ConditionOperator::StartsWith, "web"),
        ],
        match_all: true,
        folder_id: None,
    };
    let ids = |events: Vec<triage_core::event::Event>| -> Vec<i64> {
        events.into_iter().map(|e| e.id).collect()
    };
    assert_eq!(ids(engine.advanced_search(&search).await.unwrap()), vec![web]);

    search.match_all = false;
    assert_eq!(
        ids(engine.advanced_search(&search).await.unwrap()),
        vec![web, db]
    );
    assert!(engine.store().writes().is_empty());

    search.conditions[0] = FilterCondition::new("message", ConditionOperator::Contains, "[").with_regex();
    assert_matches!(
        engine.advanced_search(&search).await,
        Err(CoreError::InvalidPattern { .. })
    );
}
