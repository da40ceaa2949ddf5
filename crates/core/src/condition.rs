//! Condition evaluator: pure logic, no storage access.
//!
//! Resolves a condition's field against an event and tests it with the
//! condition's operator. Tag values are read from the tags already attached to
//! the event; callers load them first when [`requires_tags`] says so.

use std::borrow::Cow;
use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::CoreError;
use crate::event::{
    is_builtin_field, Event, FIELD_COLOR, FIELD_DATE, FIELD_EVENT_TYPE, FIELD_FOLDER,
    FIELD_MESSAGE, FIELD_SUBTYPE,
};
use crate::filter::{ConditionHandling, ConditionOperator, FilterCondition};
use crate::folder::FolderTree;
use crate::naming::normalize_tag_key;

/// Whether evaluating a condition on `field` needs the event's tags.
pub fn requires_tags(field: &str) -> bool {
    !field.trim().is_empty() && !is_builtin_field(field)
}

/// Resolve the value a condition on `field` is tested against.
///
/// `folder` yields the absolute path of the event's current folder in
/// `folders`; a folder missing from that snapshot yields `None`. Unknown
/// fields are tag lookups.
pub fn resolve_field<'e>(
    field: &str,
    event: &'e Event,
    folders: &FolderTree,
) -> Option<Cow<'e, str>> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    match field.to_ascii_lowercase().as_str() {
        FIELD_MESSAGE => Some(Cow::Borrowed(event.message.as_str())),
        FIELD_EVENT_TYPE => Some(Cow::Borrowed(event.event_type.as_str())),
        FIELD_SUBTYPE => Some(Cow::Borrowed(event.subtype.as_str())),
        FIELD_DATE => Some(Cow::Owned(event.date_string())),
        FIELD_FOLDER => folders.path_of(event.folder_id).map(Cow::Owned),
        FIELD_COLOR => Some(Cow::Owned(event.color_hex())),
        _ => event.try_get_tag(field).map(Cow::Borrowed),
    }
}

/// Case-insensitive plain-text test.
pub fn matches_text(operator: ConditionOperator, query: &str, value: &str) -> bool {
    let query = query.to_lowercase();
    let value = value.to_lowercase();
    match operator {
        ConditionOperator::Contains => value.contains(&query),
        ConditionOperator::Equals => value == query,
        ConditionOperator::StartsWith => value.starts_with(&query),
        ConditionOperator::EndsWith => value.ends_with(&query),
    }
}

/// Add the anchors an operator implies when the pattern lacks them.
///
/// `Equals` needs `^` and `$`, `StartsWith` needs `^`, `EndsWith` needs `$`.
/// When an anchor is added the original pattern is wrapped in a
/// non-capturing group so alternations stay inside the anchors.
pub fn anchor_pattern(operator: ConditionOperator, pattern: &str) -> String {
    let start = matches!(
        operator,
        ConditionOperator::Equals | ConditionOperator::StartsWith
    ) && !pattern.starts_with('^');
    let end = matches!(
        operator,
        ConditionOperator::Equals | ConditionOperator::EndsWith
    ) && !pattern.ends_with('$');
    if !start && !end {
        return pattern.to_string();
    }
    format!(
        "{}(?:{pattern}){}",
        if start { "^" } else { "" },
        if end { "$" } else { "" }
    )
}

fn compile(pattern: &str) -> Result<Regex, CoreError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| CoreError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Check a condition before it is saved: the field must be empty, built in,
/// or a valid tag key, and a regex query must compile.
pub fn validate_condition(condition: &FilterCondition) -> Result<(), CoreError> {
    if requires_tags(&condition.field) {
        normalize_tag_key(&condition.field)?;
    }
    if condition.regex {
        compile(&anchor_pattern(condition.operator, &condition.query))?;
    }
    Ok(())
}

/// Evaluates conditions, caching compiled regexes for its lifetime.
///
/// One evaluator is created per run so a regex used by a filter is compiled
/// once no matter how many events it is tested against.
#[derive(Debug, Default)]
pub struct ConditionEvaluator {
    regex_cache: HashMap<String, Regex>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn regex(&mut self, pattern: String) -> Result<&Regex, CoreError> {
        if !self.regex_cache.contains_key(&pattern) {
            let compiled = compile(&pattern)?;
            self.regex_cache.insert(pattern.clone(), compiled);
        }
        self.regex_cache
            .get(&pattern)
            .ok_or_else(|| CoreError::Internal("regex cache miss".to_string()))
    }

    /// Test `value` against a condition's operator and query, then apply
    /// `invert`. A missing value is tested as the empty string.
    pub fn test_value(
        &mut self,
        condition: &FilterCondition,
        value: Option<&str>,
    ) -> Result<bool, CoreError> {
        let value = value.unwrap_or("");
        let matched = if condition.regex {
            let pattern = anchor_pattern(condition.operator, &condition.query);
            self.regex(pattern)?.is_match(value)
        } else {
            matches_text(condition.operator, &condition.query, value)
        };
        Ok(matched != condition.invert)
    }

    /// Evaluate one condition against an event.
    pub fn evaluate(
        &mut self,
        condition: &FilterCondition,
        event: &Event,
        folders: &FolderTree,
    ) -> Result<bool, CoreError> {
        let value = resolve_field(&condition.field, event, folders);
        self.test_value(condition, value.as_deref())
    }

    /// Combine the enabled conditions under `handling`.
    ///
    /// `All` stops at the first false condition and is true when there are
    /// none; `Any` stops at the first true one and is false when there are
    /// none; `Unconditional` never looks at them.
    pub fn evaluate_all<'c, I>(
        &mut self,
        handling: ConditionHandling,
        conditions: I,
        event: &Event,
        folders: &FolderTree,
    ) -> Result<bool, CoreError>
    where
        I: IntoIterator<Item = &'c FilterCondition>,
    {
        let enabled = conditions.into_iter().filter(|c| c.enabled);
        match handling {
            ConditionHandling::Unconditional => Ok(true),
            ConditionHandling::All => {
                for condition in enabled {
                    if !self.evaluate(condition, event, folders)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ConditionHandling::Any => {
                for condition in enabled {
                    if self.evaluate(condition, event, folders)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}
