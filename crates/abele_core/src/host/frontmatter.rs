//! YAML frontmatter extraction and typed access.
//!
//! Values are parsed with `serde_yaml` and normalized into `serde_json`
//! values so every downstream reader works with one value model. Dates stay
//! plain strings (`2024-01-01` is not a YAML 1.2 timestamp).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Frontmatter field map of one note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frontmatter(BTreeMap<String, Value>);

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`. Numbers and booleans are not coerced.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// String items of a list value; a single string counts as a one-item list.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::String(value)) => vec![value.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The note `type` field.
    pub fn note_type(&self) -> Option<&str> {
        self.get_str("type")
    }

    /// Wikilinks listed under `groups`.
    pub fn groups(&self) -> Vec<String> {
        self.get_string_list("groups")
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

impl From<BTreeMap<String, Value>> for Frontmatter {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self(value)
    }
}

impl FromIterator<(String, Value)> for Frontmatter {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parses the leading `---` block of a note.
///
/// Returns `None` when the note has no frontmatter block, the block is empty,
/// or the YAML is not a mapping.
pub fn extract_frontmatter(content: &str) -> Option<Frontmatter> {
    let (yaml, _) = split_frontmatter(content)?;
    parse_yaml_mapping(&yaml)
}

/// Returns the note body with any leading frontmatter block removed.
pub fn strip_frontmatter(content: &str) -> &str {
    match split_frontmatter(content) {
        Some((_, body_start)) => &content[body_start..],
        None => content,
    }
}

/// Splits out the raw YAML and the byte offset where the body starts.
fn split_frontmatter(content: &str) -> Option<(String, usize)> {
    let mut offset = 0;
    let mut lines = content.split_inclusive('\n');

    let first = lines.next()?;
    offset += first.len();
    if first.trim_start_matches('\u{feff}').trim_end() != "---" {
        return None;
    }

    let mut yaml_lines = Vec::new();
    for line in lines {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some((yaml_lines.concat(), offset));
        }
        yaml_lines.push(line);
    }

    None
}

fn parse_yaml_mapping(yaml: &str) -> Option<Frontmatter> {
    if yaml.trim().is_empty() {
        return None;
    }
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(yaml).ok()?;
    let json_value: Value = serde_json::to_value(yaml_value).ok()?;

    match json_value {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}
