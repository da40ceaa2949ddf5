//! Filter rule model: filters, their conditions, and their actions.
//!
//! Plain data. Storage is authoritative; the engine works on a
//! [`FilterDefinition`] snapshot loaded at the start of each run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Implement `as_str`, `Display` and `FromStr` for a unit enum whose storage
/// form is its variant name. Parsing is case-insensitive.
macro_rules! named_enum {
    ($ty:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| CoreError::UnsupportedOperator {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a filter's enabled conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionHandling {
    /// Every enabled condition must hold (vacuously true when none).
    All,
    /// At least one enabled condition must hold (vacuously false when none).
    Any,
    /// Conditions are ignored.
    Unconditional,
}

named_enum!(ConditionHandling, "condition handling", [All, Any, Unconditional]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
}

named_enum!(
    ConditionOperator,
    "condition operator",
    [Contains, Equals, StartsWith, EndsWith]
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionOperator {
    MoveTo,
    Delete,
    SetColor,
    StopExecution,
    MarkRead,
    MarkUnread,
}

named_enum!(
    ActionOperator,
    "action operator",
    [MoveTo, Delete, SetColor, StopExecution, MarkRead, MarkUnread]
);

impl ActionOperator {
    /// Whether executing this action ends filter evaluation for the event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionOperator::Delete | ActionOperator::StopExecution)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A named, ordered rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: DbId,
    pub name: String,
    pub enabled: bool,
    pub condition_handling: ConditionHandling,
    /// Filters run in ascending order.
    pub sort_order: i32,
}

/// A single field test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub id: DbId,
    pub filter_id: DbId,
    pub enabled: bool,
    /// Built-in field name or tag key. Empty means "no tag".
    pub field: String,
    pub operator: ConditionOperator,
    pub query: String,
    pub regex: bool,
    pub invert: bool,
}

impl FilterCondition {
    /// An enabled, non-regex, non-inverted condition not yet bound to a
    /// filter.
    pub fn new(field: impl Into<String>, operator: ConditionOperator, query: impl Into<String>) -> Self {
        Self {
            id: 0,
            filter_id: 0,
            enabled: true,
            field: field.into(),
            operator,
            query: query.into(),
            regex: false,
            invert: false,
        }
    }

    pub fn with_regex(mut self) -> Self {
        self.regex = true;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }
}

/// A single effect applied when a filter matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterAction {
    pub id: DbId,
    pub filter_id: DbId,
    pub enabled: bool,
    pub operator: ActionOperator,
    /// Folder path for `MoveTo`, hex color for `SetColor`, unused otherwise.
    pub argument: String,
}

impl FilterAction {
    /// An enabled action not yet bound to a filter.
    pub fn new(operator: ActionOperator, argument: impl Into<String>) -> Self {
        Self {
            id: 0,
            filter_id: 0,
            enabled: true,
            operator,
            argument: argument.into(),
        }
    }
}

/// A filter together with its conditions and actions, in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub filter: Filter,
    pub conditions: Vec<FilterCondition>,
    pub actions: Vec<FilterAction>,
}

impl FilterDefinition {
    pub fn enabled_conditions(&self) -> impl Iterator<Item = &FilterCondition> {
        self.conditions.iter().filter(|c| c.enabled)
    }

    pub fn enabled_actions(&self) -> impl Iterator<Item = &FilterAction> {
        self.actions.iter().filter(|a| a.enabled)
    }

    /// Whether this filter can ever do anything: it needs at least one
    /// enabled action, and unless it is unconditional, at least one enabled
    /// condition.
    pub fn is_runnable(&self) -> bool {
        if self.enabled_actions().next().is_none() {
            return false;
        }
        self.filter.condition_handling == ConditionHandling::Unconditional
            || self.enabled_conditions().next().is_some()
    }
}

/// Input for creating or updating a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    pub enabled: bool,
    pub condition_handling: ConditionHandling,
    pub sort_order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn definition(handling: ConditionHandling) -> FilterDefinition {
        FilterDefinition {
            filter: Filter {
                id: 1,
                name: "f".into(),
                enabled: true,
                condition_handling: handling,
                sort_order: 0,
            },
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    #[test]
    fn operators_round_trip_through_strings() {
        for op in ActionOperator::ALL {
            assert_eq!(op.as_str().parse::<ActionOperator>().unwrap(), *op);
        }
        assert_eq!(
            "startswith".parse::<ConditionOperator>().unwrap(),
            ConditionOperator::StartsWith
        );
        assert_eq!(
            "unconditional".parse::<ConditionHandling>().unwrap(),
            ConditionHandling::Unconditional
        );
    }

    #[test]
    fn unknown_values_are_unsupported() {
        assert_matches!(
            "Matches".parse::<ConditionOperator>(),
            Err(CoreError::UnsupportedOperator { kind: "condition operator", .. })
        );
        assert_matches!(
            "Archive".parse::<ActionOperator>(),
            Err(CoreError::UnsupportedOperator { .. })
        );
    }

    #[test]
    fn terminal_actions() {
        assert!(ActionOperator::Delete.is_terminal());
        assert!(ActionOperator::StopExecution.is_terminal());
        assert!(!ActionOperator::MoveTo.is_terminal());
        assert!(!ActionOperator::MarkRead.is_terminal());
    }

    #[test]
    fn filter_without_enabled_actions_is_not_runnable() {
        let mut def = definition(ConditionHandling::Unconditional);
        assert!(!def.is_runnable());
        let mut action = FilterAction::new(ActionOperator::MarkRead, "");
        action.enabled = false;
        def.actions.push(action);
        assert!(!def.is_runnable());
        def.actions[0].enabled = true;
        assert!(def.is_runnable());
    }

    #[test]
    fn conditional_filter_needs_enabled_condition() {
        let mut def = definition(ConditionHandling::All);
        def.actions.push(FilterAction::new(ActionOperator::Delete, ""));
        assert!(!def.is_runnable());
        def.conditions
            .push(FilterCondition::new("message", ConditionOperator::Contains, "x"));
        assert!(def.is_runnable());
        def.conditions[0].enabled = false;
        assert!(!def.is_runnable());
    }

    #[test]
    fn enums_serialize_by_name() {
        let json = serde_json::to_string(&ActionOperator::StopExecution).unwrap();
        assert_eq!(json, "\"StopExecution\"");
    }
}
