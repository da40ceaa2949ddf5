//! Event and tag model.
//!
//! An [`Event`] is one ingested occurrence. Its hash groups semantically
//! similar events and is derived only from the type, subtype and a message
//! prefix, so routing decisions (folder, color) never change it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing::short_digest_b64;
use crate::naming::normalize_tag_key;
use crate::types::{DbId, EpochMillis, ROOT_FOLDER_ID};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const FIELD_EVENT_TYPE: &str = "eventtype";
pub const FIELD_SUBTYPE: &str = "subtype";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_DATE: &str = "date";
pub const FIELD_FOLDER: &str = "folder";
pub const FIELD_COLOR: &str = "color";

/// Field names resolved from the event itself rather than from its tags.
pub const BUILTIN_FIELDS: &[&str] = &[
    FIELD_EVENT_TYPE,
    FIELD_SUBTYPE,
    FIELD_MESSAGE,
    FIELD_DATE,
    FIELD_FOLDER,
    FIELD_COLOR,
];

/// Stored in place of an empty message or subtype.
pub const EMPTY_PLACEHOLDER: &str = "(empty)";

/// Color given to new events (neutral gray).
pub const DEFAULT_EVENT_COLOR: u32 = 0x99_99_99;

/// Only this many leading message characters participate in the hash.
pub const MAX_HASHED_MESSAGE_CHARS: usize = 250;

/// Format used for the `date` field in condition matching.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whether `name` selects a built-in event field (case-insensitive).
pub fn is_builtin_field(name: &str) -> bool {
    let name = name.trim();
    BUILTIN_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name))
}

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Severity class of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Error,
    Info,
    Debug,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Error => "Error",
            EventType::Info => "Info",
            EventType::Debug => "Debug",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(EventType::Error),
            "info" => Ok(EventType::Info),
            "debug" => Ok(EventType::Debug),
            _ => Err(CoreError::UnsupportedOperator {
                kind: "event type",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// Parse a hex color: `RRGGBB`, `#RRGGBB`, or `AARRGGBB` (alpha dropped).
pub fn parse_color(input: &str) -> Result<u32, CoreError> {
    let hex = input.trim().trim_start_matches('#');
    let valid = matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(CoreError::Validation(format!(
            "'{input}' is not a hex color (expected RRGGBB)"
        )));
    }
    u32::from_str_radix(hex, 16)
        .map(|value| value & 0x00FF_FFFF)
        .map_err(|e| CoreError::Validation(format!("'{input}' is not a hex color: {e}")))
}

/// Format a color as six uppercase hex digits, ignoring any alpha byte.
pub fn format_color(color: u32) -> String {
    format!("{:06X}", color & 0x00FF_FFFF)
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// A single tag. `key` keeps the casing it was submitted with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Tags keyed case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<Tag>", try_from = "Vec<Tag>")]
pub struct TagSet {
    entries: BTreeMap<String, Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `key` and store the tag, replacing any value stored under the
    /// same key in a different casing.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), CoreError> {
        let key = normalize_tag_key(key)?;
        self.entries.insert(
            key.to_lowercase(),
            Tag {
                key: key.to_string(),
                value: value.into(),
            },
        );
        Ok(())
    }

    /// Look up a tag value by key, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.trim().to_lowercase())
            .map(|t| t.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<TagSet> for Vec<Tag> {
    fn from(set: TagSet) -> Self {
        set.entries.into_values().collect()
    }
}

impl TryFrom<Vec<Tag>> for TagSet {
    type Error = CoreError;

    fn try_from(tags: Vec<Tag>) -> Result<Self, Self::Error> {
        let mut set = TagSet::new();
        for tag in tags {
            set.set(&tag.key, tag.value)?;
        }
        Ok(set)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One ingested occurrence.
///
/// `tags` is `None` when the event was loaded without its tags; the filter
/// engine loads them on demand the first time a tag condition needs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by storage on insert; 0 before.
    pub id: DbId,
    pub folder_id: DbId,
    pub event_type: EventType,
    pub subtype: String,
    pub message: String,
    pub date: EpochMillis,
    pub color: u32,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSet>,
}

impl Event {
    /// Create a not-yet-persisted event in the root folder with no tags.
    pub fn new(
        event_type: EventType,
        subtype: impl Into<String>,
        message: impl Into<String>,
        date: EpochMillis,
    ) -> Self {
        Self {
            id: 0,
            folder_id: ROOT_FOLDER_ID,
            event_type,
            subtype: subtype.into(),
            message: message.into(),
            date,
            color: DEFAULT_EVENT_COLOR,
            hash: String::new(),
            tags: Some(TagSet::new()),
        }
    }

    /// Validate and store a tag, attaching an empty tag set first if needed.
    pub fn set_tag(&mut self, key: &str, value: impl Into<String>) -> Result<(), CoreError> {
        self.tags.get_or_insert_with(TagSet::new).set(key, value)
    }

    /// Look up a tag. Returns `None` when the tag is absent or tags have not
    /// been loaded.
    pub fn try_get_tag(&self, key: &str) -> Option<&str> {
        self.tags.as_ref().and_then(|t| t.get(key))
    }

    pub fn tags_loaded(&self) -> bool {
        self.tags.is_some()
    }

    /// The string the hash is computed from.
    fn hash_input(&self) -> String {
        let prefix_end = self
            .message
            .char_indices()
            .nth(MAX_HASHED_MESSAGE_CHARS)
            .map(|(i, _)| i)
            .unwrap_or(self.message.len());
        format!(
            "{}\n{}\n{}",
            self.event_type.as_str(),
            self.subtype,
            &self.message[..prefix_end]
        )
    }

    /// Recompute the grouping hash. Returns `true` if the stored value changed.
    pub fn compute_hash(&mut self) -> bool {
        let hash = short_digest_b64(self.hash_input().as_bytes());
        if hash == self.hash {
            false
        } else {
            self.hash = hash;
            true
        }
    }

    /// Replace empty message/subtype with [`EMPTY_PLACEHOLDER`] and compute
    /// the hash. Called once before the first insert.
    pub fn prepare_for_insert(&mut self) {
        if self.message.trim().is_empty() {
            self.message = EMPTY_PLACEHOLDER.to_string();
        }
        if self.subtype.trim().is_empty() {
            self.subtype = EMPTY_PLACEHOLDER.to_string();
        }
        self.compute_hash();
    }

    /// The `date` field as matched by conditions. Out-of-range timestamps
    /// yield an empty string.
    pub fn date_string(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.date)
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    }

    pub fn color_hex(&self) -> String {
        format_color(self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn crash(message: &str) -> Event {
        Event::new(EventType::Error, "Crash", message, 1_700_000_000_000)
    }

    #[test]
    fn new_event_defaults() {
        let e = crash("boom");
        assert_eq!(e.id, 0);
        assert_eq!(e.folder_id, ROOT_FOLDER_ID);
        assert_eq!(e.color, DEFAULT_EVENT_COLOR);
        assert!(e.hash.is_empty());
        assert!(e.tags_loaded());
    }

    #[test]
    fn hash_is_deterministic_and_22_chars() {
        let mut a = crash("boom");
        let mut b = crash("boom");
        assert!(a.compute_hash());
        assert!(b.compute_hash());
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 22);
        assert!(!a.hash.ends_with('='));
    }

    #[test]
    fn recomputing_unchanged_hash_reports_no_change() {
        let mut e = crash("boom");
        assert!(e.compute_hash());
        assert!(!e.compute_hash());
    }

    #[test]
    fn hash_changes_with_type_subtype_or_message() {
        let mut base = crash("boom");
        base.compute_hash();

        let mut other_type = base.clone();
        other_type.event_type = EventType::Info;
        assert!(other_type.compute_hash());

        let mut other_subtype = base.clone();
        other_subtype.subtype = "Hang".into();
        assert!(other_subtype.compute_hash());

        let mut other_message = base.clone();
        other_message.message = "bang".into();
        assert!(other_message.compute_hash());
    }

    #[test]
    fn hash_ignores_folder_color_date_and_tags() {
        let mut base = crash("boom");
        base.compute_hash();

        let mut routed = base.clone();
        routed.folder_id = 7;
        routed.color = 0xFF0000;
        routed.date += 1000;
        routed.set_tag("Browser", "Firefox").unwrap();
        assert!(!routed.compute_hash());
        assert_eq!(routed.hash, base.hash);
    }

    #[test]
    fn hash_only_uses_message_prefix() {
        let prefix = "x".repeat(MAX_HASHED_MESSAGE_CHARS);
        let mut a = crash(&format!("{prefix}tail one"));
        let mut b = crash(&format!("{prefix}tail two"));
        a.compute_hash();
        b.compute_hash();
        assert_eq!(a.hash, b.hash);

        let mut c = crash(&"x".repeat(MAX_HASHED_MESSAGE_CHARS - 1));
        c.compute_hash();
        assert_ne!(a.hash, c.hash);
    }

    #[test]
    fn hash_prefix_counts_characters_not_bytes() {
        let prefix = "é".repeat(MAX_HASHED_MESSAGE_CHARS);
        let mut a = crash(&format!("{prefix}a"));
        let mut b = crash(&format!("{prefix}b"));
        a.compute_hash();
        b.compute_hash();
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn prepare_for_insert_fills_placeholders() {
        let mut e = Event::new(EventType::Debug, "", "  ", 0);
        e.prepare_for_insert();
        assert_eq!(e.message, EMPTY_PLACEHOLDER);
        assert_eq!(e.subtype, EMPTY_PLACEHOLDER);
        assert_eq!(e.hash.len(), 22);
    }

    #[test]
    fn tags_are_case_insensitive_and_keep_original_key() {
        let mut e = crash("boom");
        e.set_tag("  UserAgent ", "curl").unwrap();
        assert_eq!(e.try_get_tag("useragent"), Some("curl"));
        assert_eq!(e.try_get_tag("USERAGENT"), Some("curl"));
        let tag = e.tags.as_ref().unwrap().iter().next().unwrap();
        assert_eq!(tag.key, "UserAgent");
    }

    #[test]
    fn setting_same_key_replaces_value() {
        let mut e = crash("boom");
        e.set_tag("os", "linux").unwrap();
        e.set_tag("OS", "windows").unwrap();
        let tags = e.tags.as_ref().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("os"), Some("windows"));
    }

    #[test]
    fn reserved_tag_keys_are_rejected() {
        let mut e = crash("boom");
        assert_matches!(e.set_tag("Message", "x"), Err(CoreError::Validation(_)));
        assert!(e.tags.as_ref().unwrap().is_empty());
    }

    #[test]
    fn unloaded_tags_read_as_absent() {
        let mut e = crash("boom");
        e.tags = None;
        assert!(!e.tags_loaded());
        assert_eq!(e.try_get_tag("os"), None);
        e.set_tag("os", "linux").unwrap();
        assert_eq!(e.try_get_tag("os"), Some("linux"));
    }

    #[test]
    fn event_type_parses_case_insensitively() {
        assert_eq!("ERROR".parse::<EventType>().unwrap(), EventType::Error);
        assert_eq!("info".parse::<EventType>().unwrap(), EventType::Info);
        assert_matches!(
            "fatal".parse::<EventType>(),
            Err(CoreError::UnsupportedOperator { .. })
        );
    }

    #[test]
    fn color_parsing_and_formatting() {
        assert_eq!(parse_color("FF0000").unwrap(), 0xFF0000);
        assert_eq!(parse_color("#00ff7f").unwrap(), 0x00FF7F);
        assert_eq!(parse_color("80FF0000").unwrap(), 0xFF0000);
        assert!(parse_color("red").is_err());
        assert!(parse_color("FFF").is_err());
        assert_eq!(format_color(0xFF12_3456), "123456");
        assert_eq!(format_color(0xAB), "0000AB");
    }

    #[test]
    fn date_string_is_utc() {
        let e = Event::new(EventType::Info, "s", "m", 0);
        assert_eq!(e.date_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn tag_set_serializes_as_list() {
        let mut tags = TagSet::new();
        tags.set("Os", "linux").unwrap();
        let json = serde_json::to_value(&tags).unwrap();
        assert_eq!(json, serde_json::json!([{"key": "Os", "value": "linux"}]));
        let back: TagSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, tags);
    }
}
