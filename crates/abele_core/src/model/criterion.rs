//! Single note-matching rule over a path, name, property or body.
//!
//! Regex values may be written as `/pattern/flags`; `i`, `m` and `s` are
//! honoured and the remaining JavaScript flags are accepted but ignored. An
//! invalid pattern is logged and never matches.

use crate::host::{strip_frontmatter, Frontmatter, VaultHost};
use crate::paths::name_from_path;
use log::warn;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

static DELIMITED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(.+)/([gimsuvy]*)$").expect("valid delimited regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CriterionType {
    #[default]
    Path,
    Name,
    Property,
    Content,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CriterionOperator {
    #[default]
    Equals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    Exists,
    NotExists,
}

impl CriterionOperator {
    fn needs_value(self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Criterion {
    pub id: String,
    #[serde(rename = "type")]
    pub criterion_type: CriterionType,
    pub operator: CriterionOperator,
    /// Frontmatter key, for property criteria only.
    pub property: String,
    pub value: String,
}

impl Default for Criterion {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            criterion_type: CriterionType::default(),
            operator: CriterionOperator::default(),
            property: String::new(),
            value: String::new(),
        }
    }
}

impl Criterion {
    pub fn new(criterion_type: CriterionType, operator: CriterionOperator, value: impl Into<String>) -> Self {
        Self {
            criterion_type,
            operator,
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn for_property(property: impl Into<String>, operator: CriterionOperator, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            ..Self::new(CriterionType::Property, operator, value)
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.criterion_type == CriterionType::Property && self.property.is_empty() {
            return false;
        }
        !(self.operator.needs_value() && self.value.is_empty())
    }

    /// Evaluates the criterion against the note at `path`.
    pub fn check(&self, host: &dyn VaultHost, path: &str) -> bool {
        match self.criterion_type {
            CriterionType::Path => self.check_path(path),
            CriterionType::Name => self.check_path(name_from_path(path)),
            CriterionType::Property => {
                let frontmatter = host.frontmatter(path).unwrap_or_default();
                self.check_property(&frontmatter)
            }
            CriterionType::Content => host
                .read(path)
                .is_some_and(|content| self.check_content(strip_frontmatter(&content))),
        }
    }

    pub fn check_path(&self, path: &str) -> bool {
        let value = self.value.as_str();
        match self.operator {
            CriterionOperator::Equals => path == value,
            CriterionOperator::Contains => path.contains(value),
            CriterionOperator::NotContains => !path.contains(value),
            CriterionOperator::StartsWith => path.starts_with(value),
            CriterionOperator::EndsWith => path.ends_with(value),
            CriterionOperator::Regex => matches_pattern(path, value),
            CriterionOperator::Exists | CriterionOperator::NotExists => false,
        }
    }

    pub fn check_property(&self, properties: &Frontmatter) -> bool {
        let value = self.value.as_str();
        let property = properties.get(&self.property);
        match (self.operator, property) {
            (CriterionOperator::Exists, found) => found.is_some(),
            (CriterionOperator::NotExists, found) => found.is_none(),
            (CriterionOperator::Equals, Some(Value::String(found))) => found == value,
            (CriterionOperator::Contains, Some(found)) => contains(found, value).unwrap_or(false),
            (CriterionOperator::NotContains, Some(found)) => {
                contains(found, value).map(|hit| !hit).unwrap_or(false)
            }
            (CriterionOperator::StartsWith, Some(Value::String(found))) => found.starts_with(value),
            (CriterionOperator::EndsWith, Some(Value::String(found))) => found.ends_with(value),
            (CriterionOperator::Regex, Some(Value::String(found))) => matches_pattern(found, value),
            _ => false,
        }
    }

    pub fn check_content(&self, content: &str) -> bool {
        let value = self.value.as_str();
        match self.operator {
            CriterionOperator::Contains => content.contains(value),
            CriterionOperator::NotContains => !content.contains(value),
            CriterionOperator::StartsWith => content.starts_with(value),
            CriterionOperator::EndsWith => content.ends_with(value),
            CriterionOperator::Regex => matches_pattern(content, value),
            _ => false,
        }
    }
}

/// `None` when the property is neither a string nor a list.
fn contains(found: &Value, value: &str) -> Option<bool> {
    match found {
        Value::String(text) => Some(text.contains(value)),
        Value::Array(items) => Some(items.iter().any(|item| item.as_str() == Some(value))),
        _ => None,
    }
}

fn matches_pattern(haystack: &str, pattern: &str) -> bool {
    let (source, flags) = match DELIMITED_RE.captures(pattern) {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => (pattern, ""),
    };

    match RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
    {
        Ok(regex) => regex.is_match(haystack),
        Err(err) => {
            warn!(
                "event=criterion_regex module=model status=invalid pattern={} error={}",
                pattern,
                err.to_string().replace('\n', " ")
            );
            false
        }
    }
}
