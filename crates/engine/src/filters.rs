//! Filter CRUD with the name and ownership guards.

use triage_core::condition::validate_condition;
use triage_core::error::CoreError;
use triage_core::event::parse_color;
use triage_core::filter::{
    ActionOperator, Filter, FilterAction, FilterCondition, FilterDefinition, FilterSpec,
};
use triage_core::naming::validate_filter_name;
use triage_core::store::EventStore;
use triage_core::types::DbId;

use crate::engine::FilterEngine;

/// Check an action's argument before it is saved.
pub fn validate_action(action: &FilterAction) -> Result<(), CoreError> {
    match action.operator {
        ActionOperator::SetColor => parse_color(&action.argument).map(|_| ()),
        ActionOperator::MoveTo if action.argument.trim().is_empty() => Err(
            CoreError::Validation("MoveTo needs a target folder path".to_string()),
        ),
        _ => Ok(()),
    }
}

/// Reject a rule record that claims to belong to another filter. An owner id
/// of 0 marks a new record.
fn ensure_owner(kind: &str, id: DbId, owner: DbId, filter_id: DbId) -> Result<(), CoreError> {
    if owner != 0 && owner != filter_id {
        return Err(CoreError::Validation(format!(
            "{kind} {id} belongs to filter {owner}, not filter {filter_id}"
        )));
    }
    Ok(())
}

impl<S: EventStore> FilterEngine<S> {
    /// All filters in run order.
    pub async fn list_filters(&self) -> Result<Vec<FilterDefinition>, CoreError> {
        let mut filters = self.store().load_filters().await?;
        filters.sort_by_key(|def| (def.filter.sort_order, def.filter.id));
        Ok(filters)
    }

    pub async fn get_filter(&self, id: DbId) -> Result<FilterDefinition, CoreError> {
        self.store()
            .load_filter(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "filter", id })
    }

    /// Validate a filter name and check it is unused (case-insensitively) by
    /// any filter other than `except`.
    async fn ensure_filter_name(&self, name: &str, except: Option<DbId>) -> Result<(), CoreError> {
        validate_filter_name(name)?;
        let lowered = name.to_lowercase();
        let taken = self
            .store()
            .load_filters()
            .await?
            .into_iter()
            .any(|def| Some(def.filter.id) != except && def.filter.name.to_lowercase() == lowered);
        if taken {
            return Err(CoreError::Conflict(format!(
                "A filter named '{name}' already exists"
            )));
        }
        Ok(())
    }

    pub async fn create_filter(&self, spec: &FilterSpec) -> Result<Filter, CoreError> {
        self.ensure_filter_name(&spec.name, None).await?;
        let filter = self.store().create_filter(spec).await?;
        tracing::info!(filter_id = filter.id, name = %filter.name, "Filter created");
        Ok(filter)
    }

    pub async fn update_filter(&self, id: DbId, spec: &FilterSpec) -> Result<Filter, CoreError> {
        self.ensure_filter_name(&spec.name, Some(id)).await?;
        self.store()
            .update_filter(id, spec)
            .await?
            .ok_or(CoreError::NotFound { entity: "filter", id })
    }

    pub async fn delete_filter(&self, id: DbId) -> Result<(), CoreError> {
        if !self.store().delete_filter(id).await? {
            return Err(CoreError::NotFound { entity: "filter", id });
        }
        tracing::info!(filter_id = id, "Filter deleted");
        Ok(())
    }

    /// Replace a filter's conditions and actions in one bulk edit.
    ///
    /// Every record must belong to `filter_id` (or be new, with owner 0) and
    /// pass validation; nothing is written otherwise.
    pub async fn replace_filter_rules(
        &self,
        filter_id: DbId,
        conditions: Vec<FilterCondition>,
        actions: Vec<FilterAction>,
    ) -> Result<FilterDefinition, CoreError> {
        self.get_filter(filter_id).await?;

        let mut conditions = conditions;
        for condition in &mut conditions {
            ensure_owner("Condition", condition.id, condition.filter_id, filter_id)?;
            validate_condition(condition)?;
            condition.filter_id = filter_id;
        }
        let mut actions = actions;
        for action in &mut actions {
            ensure_owner("Action", action.id, action.filter_id, filter_id)?;
            validate_action(action)?;
            action.filter_id = filter_id;
        }

        self.store()
            .replace_filter_rules(filter_id, &conditions, &actions)
            .await?;
        tracing::info!(
            filter_id,
            conditions = conditions.len(),
            actions = actions.len(),
            "Filter rules replaced",
        );
        self.get_filter(filter_id).await
    }
}
