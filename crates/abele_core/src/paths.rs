//! Vault path and wikilink normalization.
//!
//! # Responsibility
//! - Convert between vault-relative paths and wikilink syntax.
//! - Compare paths either name-wise or by full normalized path.
//!
//! # Invariants
//! - Normalized paths have no leading/trailing slashes and always end in `.md`.
//! - `normalize_path` is idempotent.
//! - Comparison is case-sensitive.

use once_cell::sync::Lazy;
use regex::Regex;

const MARKDOWN_EXTENSION: &str = ".md";

static WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid wikilink regex"));
static INVALID_FILE_NAME_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\[\]/\\?%*:|"<>]"#).expect("valid file name regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Trims, strips leading/trailing slashes and ensures a `.md` extension.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/').trim();
    if trimmed.ends_with(MARKDOWN_EXTENSION) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{MARKDOWN_EXTENSION}")
    }
}

/// Returns the last path segment, extension included.
pub fn file_name_from_path(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Returns the last path segment without the `.md` extension.
pub fn name_from_path(path: &str) -> &str {
    let file_name = file_name_from_path(path);
    file_name
        .strip_suffix(MARKDOWN_EXTENSION)
        .unwrap_or(file_name)
}

/// Returns the folder part of a path, or an empty string for root-level files.
pub fn folder_from_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Whether the value carries a folder component.
pub fn is_path(path: &str) -> bool {
    path.contains('/')
}

/// Compares two paths for equality.
///
/// When either side has no folder component (wikilinks may omit it), only the
/// normalized file names are compared; otherwise the full normalized paths.
pub fn compare_paths(path_a: &str, path_b: &str) -> bool {
    let normalized_a = normalize_path(path_a);
    let normalized_b = normalize_path(path_b);

    if !is_path(path_a) || !is_path(path_b) {
        return file_name_from_path(&normalized_a) == file_name_from_path(&normalized_b);
    }

    normalized_a == normalized_b
}

/// Whether the value contains `[[...]]` wikilink syntax.
pub fn is_wikilink(link: &str) -> bool {
    WIKILINK_RE.is_match(link)
}

/// Extracts the link target of the first wikilink, alias removed and normalized.
pub fn wikilink_to_path(link: &str) -> Option<String> {
    let inner = WIKILINK_RE.captures(link)?.get(1)?.as_str();
    let target = inner.split('|').next().unwrap_or(inner);
    Some(normalize_path(target))
}

/// Returns the alias of the first wikilink, or the linked note name.
pub fn alias_or_name_from_wikilink(link: &str) -> Option<String> {
    let inner = WIKILINK_RE.captures(link)?.get(1)?.as_str();
    let mut parts = inner.split('|');
    let target = parts.next().unwrap_or(inner).trim();
    match parts.next() {
        Some(alias) => Some(alias.trim().to_string()),
        None => Some(name_from_path(target).to_string()),
    }
}

/// Builds `[[path|alias]]`, defaulting the alias to the file name.
pub fn path_to_wikilink(path: &str, alias: Option<&str>) -> String {
    let path = path.strip_suffix(MARKDOWN_EXTENSION).unwrap_or(path);
    let alias = match alias {
        Some(value) if !value.is_empty() => value,
        _ => file_name_from_path(path),
    };
    format!("[[{path}|{alias}]]")
}

/// Drops the alias part of the first wikilink.
pub fn remove_alias_from_wikilink(link: &str) -> String {
    match WIKILINK_RE.captures(link).and_then(|caps| caps.get(1)) {
        Some(inner) => {
            let target = inner.as_str().split('|').next().unwrap_or("").trim();
            format!("[[{target}]]")
        }
        None => link.to_string(),
    }
}

/// Strips characters that are invalid in file names and collapses whitespace.
///
/// Only the first line of the input is kept.
pub fn clean_file_name(file_name: &str) -> String {
    let first_line = file_name.split('\n').next().unwrap_or("");
    let without_invalid = INVALID_FILE_NAME_CHARS_RE.replace_all(first_line, "");
    WHITESPACE_RE
        .replace_all(&without_invalid, " ")
        .trim()
        .to_string()
}

/// Joins a folder and a note name into a normalized path.
pub fn resolve_path(folder: &str, name: &str) -> String {
    let folder = folder.trim().trim_matches('/');
    let name = name.trim().trim_matches('/');

    if folder.is_empty() {
        return normalize_path(name);
    }

    normalize_path(&format!("{folder}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::{
        alias_or_name_from_wikilink, clean_file_name, compare_paths, folder_from_path,
        name_from_path, normalize_path, path_to_wikilink, remove_alias_from_wikilink,
        resolve_path, wikilink_to_path,
    };

    #[test]
    fn normalize_strips_slashes_and_appends_extension() {
        assert_eq!(normalize_path(" /Notes/Idea/ "), "Notes/Idea.md");
        assert_eq!(normalize_path("Notes/Idea.md"), "Notes/Idea.md");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in ["a", "/a/b/", "a.md", "  x/y.md  ", "", "/ x", " / x / ", "x/ "] {
            let once = normalize_path(input);
            assert_eq!(normalize_path(&once), once, "input `{input}`");
        }
    }

    #[test]
    fn compare_uses_name_when_folder_missing() {
        assert!(compare_paths("Projects/Alpha.md", "Alpha"));
        assert!(compare_paths("Alpha", "Other/Alpha.md"));
        assert!(!compare_paths("Projects/Alpha.md", "Other/Alpha.md"));
        assert!(compare_paths("Projects/Alpha", "Projects/Alpha.md"));
        assert!(!compare_paths("alpha", "Alpha"));
    }

    #[test]
    fn wikilink_round_trip_keeps_alias() {
        assert_eq!(
            wikilink_to_path("see [[Tasks/Buy milk|milk]] later").as_deref(),
            Some("Tasks/Buy milk.md")
        );
        assert_eq!(wikilink_to_path("no link here"), None);
        assert_eq!(
            path_to_wikilink("Tasks/Buy milk.md", None),
            "[[Tasks/Buy milk|Buy milk]]"
        );
        assert_eq!(
            path_to_wikilink("Tasks/Buy milk.md", Some("milk")),
            "[[Tasks/Buy milk|milk]]"
        );
    }

    #[test]
    fn alias_falls_back_to_note_name() {
        assert_eq!(
            alias_or_name_from_wikilink("[[Tasks/Buy milk]]").as_deref(),
            Some("Buy milk")
        );
        assert_eq!(
            alias_or_name_from_wikilink("[[Tasks/Buy milk| milk ]]").as_deref(),
            Some("milk")
        );
        assert_eq!(remove_alias_from_wikilink("[[a/b|c]]"), "[[a/b]]");
    }

    #[test]
    fn path_parts_and_cleaning() {
        assert_eq!(name_from_path("a/b/c.md"), "c");
        assert_eq!(folder_from_path("a/b/c.md"), "a/b");
        assert_eq!(folder_from_path("c.md"), "");
        assert_eq!(clean_file_name("What: a [[title]]?\nsecond"), "What a title");
        assert_eq!(resolve_path("/Tasks/", "Buy milk"), "Tasks/Buy milk.md");
        assert_eq!(resolve_path("", "Buy milk.md"), "Buy milk.md");
    }
}
