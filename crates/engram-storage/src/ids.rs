//! Identifier helpers

use std::path::Path;

/// Derive a stable project id from an absolute root path
///
/// Path separators and drive-colon characters become underscores, leading
/// underscores are stripped, and the result keeps the *last* 100 characters
/// so distinct deep paths stay distinguishable.
pub fn derive_project_id(root_path: &Path) -> String {
    let flattened: String = root_path
        .to_string_lossy()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect();
    let trimmed = flattened.trim_start_matches('_');
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() > 100 {
        chars[chars.len() - 100..].iter().collect()
    } else {
        trimmed.to_string()
    }
}

/// Strip a `table:` prefix so callers may pass either a bare key or the
/// full record reference
pub(crate) fn record_key<'a>(input: &'a str, table: &str) -> &'a str {
    input
        .strip_prefix(table)
        .and_then(|rest| rest.strip_prefix(':'))
        .map_or(input, |key| key.trim_matches(['⟨', '⟩']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn separators_become_underscores() {
        let id = derive_project_id(&PathBuf::from("/home/dev/my-project"));
        assert_eq!(id, "home_dev_my-project");
    }

    #[test]
    fn windows_paths_flatten_too() {
        let id = derive_project_id(&PathBuf::from("C:\\work\\repo"));
        assert_eq!(id, "C_work_repo");
    }

    #[test]
    fn long_paths_keep_the_tail() {
        let deep = format!("/{}", "segment/".repeat(30));
        let id = derive_project_id(&PathBuf::from(deep));
        assert_eq!(id.chars().count(), 100);
        assert!(!id.starts_with('_'));
    }

    #[test]
    fn record_key_accepts_both_forms() {
        assert_eq!(record_key("abc123", "entities"), "abc123");
        assert_eq!(record_key("entities:abc123", "entities"), "abc123");
        assert_eq!(record_key("entities:⟨ab-c⟩", "entities"), "ab-c");
        // A different table's prefix is left alone
        assert_eq!(record_key("events:x", "entities"), "events:x");
    }
}
