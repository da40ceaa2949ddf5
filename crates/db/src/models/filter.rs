//! Filter, condition and action rows.
//!
//! Enum-valued columns hold the variant name (`"All"`, `"StartsWith"`,
//! `"MoveTo"`, ...). Parsing is case-insensitive; an unknown value fails the
//! conversion with [`CoreError::UnsupportedOperator`].

use serde::Serialize;
use sqlx::FromRow;
use triage_core::error::CoreError;
use triage_core::filter::{Filter, FilterAction, FilterCondition};
use triage_core::types::DbId;

/// A row from the `filters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FilterRow {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub enabled: bool,
    pub condition_handling: String,
    pub sort_order: i32,
}

/// A row from the `filter_conditions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FilterConditionRow {
    pub id: DbId,
    pub filter_id: DbId,
    pub position: i32,
    pub enabled: bool,
    pub field: String,
    pub operator: String,
    pub query: String,
    pub is_regex: bool,
    pub invert: bool,
}

/// A row from the `filter_actions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FilterActionRow {
    pub id: DbId,
    pub filter_id: DbId,
    pub position: i32,
    pub enabled: bool,
    pub operator: String,
    pub argument: String,
}

impl TryFrom<FilterRow> for Filter {
    type Error = CoreError;

    fn try_from(row: FilterRow) -> Result<Self, Self::Error> {
        Ok(Filter {
            id: row.id,
            name: row.name,
            enabled: row.enabled,
            condition_handling: row.condition_handling.parse()?,
            sort_order: row.sort_order,
        })
    }
}

impl TryFrom<FilterConditionRow> for FilterCondition {
    type Error = CoreError;

    fn try_from(row: FilterConditionRow) -> Result<Self, Self::Error> {
        Ok(FilterCondition {
            id: row.id,
            filter_id: row.filter_id,
            enabled: row.enabled,
            field: row.field,
            operator: row.operator.parse()?,
            query: row.query,
            regex: row.is_regex,
            invert: row.invert,
        })
    }
}

impl TryFrom<FilterActionRow> for FilterAction {
    type Error = CoreError;

    fn try_from(row: FilterActionRow) -> Result<Self, Self::Error> {
        Ok(FilterAction {
            id: row.id,
            filter_id: row.filter_id,
            enabled: row.enabled,
            operator: row.operator.parse()?,
            argument: row.argument,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use triage_core::filter::{ConditionHandling, ConditionOperator};

    #[test]
    fn enum_columns_parse_case_insensitively() {
        let filter = Filter::try_from(FilterRow {
            id: 1,
            project_id: 1,
            name: "Crashes".into(),
            enabled: true,
            condition_handling: "unconditional".into(),
            sort_order: 3,
        })
        .unwrap();
        assert_eq!(filter.condition_handling, ConditionHandling::Unconditional);

        let condition = FilterCondition::try_from(FilterConditionRow {
            id: 2,
            filter_id: 1,
            position: 0,
            enabled: true,
            field: "subtype".into(),
            operator: "StartsWith".into(),
            query: "Cr".into(),
            is_regex: true,
            invert: false,
        })
        .unwrap();
        assert_eq!(condition.operator, ConditionOperator::StartsWith);
        assert!(condition.regex);
    }

    #[test]
    fn unknown_action_operator_is_rejected() {
        let result = FilterAction::try_from(FilterActionRow {
            id: 3,
            filter_id: 1,
            position: 0,
            enabled: true,
            operator: "Archive".into(),
            argument: String::new(),
        });
        assert_matches!(
            result,
            Err(CoreError::UnsupportedOperator { kind: "action operator", .. })
        );
    }
}
