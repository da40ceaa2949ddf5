//! Name rules for folders, filters, and tag keys.
//!
//! Every check returns a human-readable [`CoreError::Validation`] so callers
//! can surface the message directly.

use crate::error::CoreError;
use crate::event::is_builtin_field;

/// Maximum allowed length (in characters) for folder and filter names.
pub const MAX_NAME_LENGTH: usize = 128;

/// Maximum allowed length (in characters) for a tag key.
pub const MAX_TAG_KEY_LENGTH: usize = 128;

/// Characters that cannot appear in a file or archive entry name.
const UNSAFE_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Validate a printable name: non-empty, no surrounding whitespace, no
/// control characters, within [`MAX_NAME_LENGTH`].
fn validate_printable(kind: &str, name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(format!("{kind} name must not be empty")));
    }
    if name.trim().len() != name.len() {
        return Err(CoreError::Validation(format!(
            "{kind} name must not have leading or trailing whitespace"
        )));
    }
    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "{kind} name must not exceed {MAX_NAME_LENGTH} characters, got {length}"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(CoreError::Validation(format!(
            "{kind} name must not contain control characters"
        )));
    }
    Ok(())
}

/// Validate a folder name. On top of the printable rules, folder names end up
/// as archive entry names, so path separators, wildcard characters and the
/// `.` / `..` components are refused.
pub fn validate_folder_name(name: &str) -> Result<(), CoreError> {
    validate_printable("Folder", name)?;
    if let Some(c) = name.chars().find(|c| UNSAFE_FILE_CHARS.contains(c)) {
        return Err(CoreError::Validation(format!(
            "Folder name must not contain '{c}'"
        )));
    }
    if name == "." || name == ".." {
        return Err(CoreError::Validation(format!(
            "'{name}' is not a valid folder name"
        )));
    }
    Ok(())
}

/// Validate a filter name.
pub fn validate_filter_name(name: &str) -> Result<(), CoreError> {
    validate_printable("Filter", name)
}

/// Validate and normalize a tag key.
///
/// The key is trimmed; the trimmed key is returned on success. Empty keys,
/// keys with control characters, overlong keys, and keys naming a built-in
/// event field are rejected.
pub fn normalize_tag_key(key: &str) -> Result<&str, CoreError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Tag key must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_TAG_KEY_LENGTH {
        return Err(CoreError::Validation(format!(
            "Tag key must not exceed {MAX_TAG_KEY_LENGTH} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CoreError::Validation(
            "Tag key must not contain control characters".to_string(),
        ));
    }
    if is_builtin_field(trimmed) {
        return Err(CoreError::Validation(format!(
            "'{trimmed}' is a reserved field name and cannot be used as a tag key"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn folder_name_accepts_plain_names() {
        assert!(validate_folder_name("Crashes").is_ok());
        assert!(validate_folder_name("Release 1.2 (beta)").is_ok());
    }

    #[test]
    fn folder_name_rejects_empty() {
        assert_matches!(validate_folder_name(""), Err(CoreError::Validation(_)));
        assert_matches!(validate_folder_name("   "), Err(CoreError::Validation(_)));
    }

    #[test]
    fn folder_name_rejects_unsafe_characters() {
        for name in ["a/b", "a\\b", "a:b", "what?", "x|y", "<tag>"] {
            assert_matches!(validate_folder_name(name), Err(CoreError::Validation(_)));
        }
    }

    #[test]
    fn folder_name_rejects_dot_components() {
        assert!(validate_folder_name(".").is_err());
        assert!(validate_folder_name("..").is_err());
        assert!(validate_folder_name(".hidden").is_ok());
    }

    #[test]
    fn folder_name_rejects_control_characters() {
        assert!(validate_folder_name("tab\there").is_err());
    }

    #[test]
    fn filter_name_allows_slashes() {
        assert!(validate_filter_name("Move a/b crashes").is_ok());
    }

    #[test]
    fn filter_name_rejects_surrounding_whitespace() {
        assert!(validate_filter_name(" padded").is_err());
    }

    #[test]
    fn filter_name_rejects_overlong() {
        let name = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(validate_filter_name(&name).is_err());
        let name = "x".repeat(MAX_NAME_LENGTH);
        assert!(validate_filter_name(&name).is_ok());
    }

    #[test]
    fn tag_key_is_trimmed() {
        assert_eq!(normalize_tag_key("  Browser ").unwrap(), "Browser");
    }

    #[test]
    fn tag_key_rejects_reserved_names_case_insensitively() {
        for key in ["message", "Subtype", "EVENTTYPE", "date", "folder", "color"] {
            assert_matches!(normalize_tag_key(key), Err(CoreError::Validation(_)));
        }
    }

    #[test]
    fn tag_key_rejects_empty() {
        assert!(normalize_tag_key(" ").is_err());
    }
}
