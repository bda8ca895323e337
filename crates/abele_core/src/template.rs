//! Note templating and task note rendering.
//!
//! # Responsibility
//! - Render `{{key}}` / `{{date:FORMAT}}` placeholders in paths and bodies.
//! - Create notes from template files without clobbering existing ones.
//! - Serialize a task into its frontmatter + body note form.
//!
//! # Invariants
//! - `create_note_from_template` never overwrites an existing note.
//! - `get_available_path` only returns paths that do not exist yet.

use crate::dates::{format_date, parse_date, TIME_FORMAT};
use crate::host::{Frontmatter, VaultError, VaultHost};
use crate::model::task::TaskCreateRequest;
use crate::paths::{clean_file_name, folder_from_path, normalize_path, file_name_from_path};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Placeholder values keyed by name. `date` feeds `{{date:FORMAT}}`.
pub type TemplateData = BTreeMap<String, String>;

const DEFAULT_NOTE_NAME: &str = "Untitled";
const MAX_FILENAME_LENGTH: usize = 250;
const SUFFIX_PLACEHOLDER: &str = " (999)";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("valid placeholder regex"));

/// Date format tokens, longest first so prefixes never shadow longer tokens.
const DATE_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("MMMM", "%B"),
    ("dddd", "%A"),
    ("MMM", "%b"),
    ("ddd", "%a"),
    ("YY", "%y"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("hh", "%I"),
    ("mm", "%M"),
    ("ss", "%S"),
    ("M", "%-m"),
    ("D", "%-d"),
    ("d", "%w"),
    ("H", "%-H"),
    ("h", "%-I"),
    ("m", "%-M"),
    ("s", "%-S"),
    ("A", "%p"),
];

#[derive(Debug)]
pub enum TemplateError {
    Vault(VaultError),
    /// Target path has no file name.
    EmptyPath,
    Yaml(serde_yaml::Error),
}

impl Display for TemplateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vault(err) => write!(f, "{err}"),
            Self::EmptyPath => write!(f, "note path is empty"),
            Self::Yaml(err) => write!(f, "failed to serialize frontmatter: {err}"),
        }
    }
}

impl Error for TemplateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Vault(err) => Some(err),
            Self::EmptyPath => None,
            Self::Yaml(err) => Some(err),
        }
    }
}

impl From<VaultError> for TemplateError {
    fn from(value: VaultError) -> Self {
        Self::Vault(value)
    }
}

impl From<serde_yaml::Error> for TemplateError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

/// Replaces every `{{...}}` placeholder. Unknown keys render empty.
pub fn render_template(template: &str, data: &TemplateData) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let key = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            match key.strip_prefix("date:") {
                Some(format) => data
                    .get("date")
                    .and_then(|value| parse_date(value))
                    .map(|date| date.format(&translate_date_format(format)).to_string())
                    .unwrap_or_default(),
                None => data.get(key).cloned().unwrap_or_default(),
            }
        })
        .into_owned()
}

/// Translates a `YYYY-MM-DD` style format into a `chrono` format string.
///
/// Text in `[brackets]` is copied verbatim.
pub fn translate_date_format(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;

    'outer: while let Some(ch) = rest.chars().next() {
        if ch == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end].replace('%', "%%"));
                rest = &rest[end + 1..];
                continue;
            }
        }
        for (token, replacement) in DATE_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        if ch == '%' {
            out.push_str("%%");
        } else {
            out.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }

    out
}

/// Renders a path template and a template note into a new note.
///
/// Returns `Ok(None)` when the rendered path already exists.
pub fn create_note_from_template(
    host: &dyn VaultHost,
    data: &TemplateData,
    path_template: Option<&str>,
    template_path: Option<&str>,
) -> Result<Option<String>, TemplateError> {
    let template_content = template_path
        .and_then(|path| host.read(&normalize_path(path)))
        .unwrap_or_default();
    let content = render_template(&template_content, data);

    let mut rendered_path = render_template(path_template.unwrap_or(DEFAULT_NOTE_NAME), data)
        .trim()
        .to_string();
    if rendered_path.is_empty() {
        rendered_path = DEFAULT_NOTE_NAME.to_string();
    }
    let path = normalize_path(&rendered_path);

    if host.file_exists(&path) {
        info!("event=note_create module=template status=skipped reason=exists path={path}");
        return Ok(None);
    }

    host.create(&path, &content)?;
    info!("event=note_create module=template status=ok path={path}");
    Ok(Some(path))
}

/// Cleans the file name of `original` and appends ` (n)` until the path is free.
pub fn get_available_path(host: &dyn VaultHost, original: &str) -> String {
    let parent = folder_from_path(original);
    let cleaned = clean_file_name(file_name_from_path(original));
    let join = |name: &str| {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}/{name}")
        }
    };

    let initial = join(&cleaned);
    if cleaned.chars().count() <= MAX_FILENAME_LENGTH && !host.file_exists(&initial) {
        return initial;
    }

    let (mut base, extension) = match cleaned.rfind('.') {
        Some(index) => (cleaned[..index].to_string(), cleaned[index..].to_string()),
        None => (cleaned.clone(), String::new()),
    };

    let max_base = MAX_FILENAME_LENGTH
        .saturating_sub(extension.chars().count())
        .saturating_sub(SUFFIX_PLACEHOLDER.len());
    if base.chars().count() > max_base {
        base = base.chars().take(max_base).collect::<String>().trim_end().to_string();
    }

    let mut counter = 1u32;
    loop {
        let candidate = join(&format!("{base} ({counter}){extension}"));
        if !host.file_exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Task note serializer.
pub struct TaskNoteTemplate;

impl TaskNoteTemplate {
    /// Renders frontmatter + content. Previous properties are kept unless a
    /// task field owns the key, in which case an unset field removes it.
    pub fn render(request: &TaskCreateRequest) -> Result<String, TemplateError> {
        let mut frontmatter: Frontmatter = request.old_props.clone();
        frontmatter.remove("content");
        frontmatter.insert("type", Value::String("task".to_string()));

        let time = |value: Option<chrono::NaiveTime>| value.map(|t| t.format(TIME_FORMAT).to_string());
        let fields = [
            ("completed", request.completed_at.map(format_date)),
            ("date", request.date.map(format_date)),
            ("dateTime", time(request.date_time)),
            ("due", request.due.map(format_date)),
            ("dueTime", time(request.due_time)),
            ("recurrence", request.recurrence.clone()),
            ("created", request.created_at.map(format_date)),
        ];
        for (key, value) in fields {
            match value {
                Some(value) => {
                    frontmatter.insert(key, Value::String(value));
                }
                None => {
                    frontmatter.remove(key);
                }
            }
        }

        let yaml = serde_yaml::to_string(&frontmatter)?;
        Ok(format!("---\n{yaml}---\n{}", request.content))
    }

    /// Writes the task note at `path`, replacing it when `overwrite` is set.
    pub fn write(
        host: &dyn VaultHost,
        path: &str,
        request: &TaskCreateRequest,
        overwrite: bool,
    ) -> Result<(), TemplateError> {
        let path = normalize_path(path);
        if crate::paths::name_from_path(&path).trim().is_empty() {
            return Err(TemplateError::EmptyPath);
        }

        let content = Self::render(request)?;
        if host.file_exists(&path) {
            if !overwrite {
                warn!("event=task_write module=template status=skipped reason=exists path={path}");
                return Ok(());
            }
            host.modify(&path, &content)?;
        } else {
            host.create(&path, &content)?;
        }
        info!("event=task_write module=template status=ok path={path}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{render_template, translate_date_format, TaskNoteTemplate, TemplateData};
    use crate::host::extract_frontmatter;
    use crate::model::task::TaskCreateRequest;
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::Value;

    fn data(date: &str) -> TemplateData {
        let mut data = TemplateData::new();
        data.insert("date".to_string(), date.to_string());
        data.insert("title".to_string(), "Standup".to_string());
        data
    }

    #[test]
    fn date_tokens_translate_to_chrono() {
        assert_eq!(translate_date_format("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(translate_date_format("dddd, MMMM D"), "%A, %B %-d");
        assert_eq!(translate_date_format("[Week] ww%"), "Week ww%%");
    }

    #[test]
    fn placeholders_render_keys_and_dates() {
        let rendered = render_template(
            "Journal/{{date:YYYY}}/{{ date:YYYY-MM-DD }} {{title}}{{missing}}",
            &data("2024-03-05"),
        );
        assert_eq!(rendered, "Journal/2024/2024-03-05 Standup");
        assert_eq!(render_template("{{date:YYYY}}", &TemplateData::new()), "");
    }

    #[test]
    fn task_note_keeps_old_props_and_drops_cleared_fields() {
        let old = extract_frontmatter("---\ntype: task\ncompleted: 2024-01-01\npriority: high\n---\n")
            .expect("old frontmatter should parse");
        let request = TaskCreateRequest {
            title: "Water plants".to_string(),
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1),
            due: NaiveDate::from_ymd_opt(2024, 1, 8),
            due_time: NaiveTime::from_hms_opt(9, 30, 0),
            recurrence: Some("every week".to_string()),
            content: "Water plants\n".to_string(),
            old_props: old,
            ..TaskCreateRequest::default()
        };

        let note = TaskNoteTemplate::render(&request).expect("task note should render");
        assert!(note.ends_with("---\nWater plants\n"));

        let fm = extract_frontmatter(&note).expect("rendered frontmatter should parse");
        assert_eq!(fm.note_type(), Some("task"));
        assert_eq!(fm.get_str("due"), Some("2024-01-08"));
        assert_eq!(fm.get_str("dueTime"), Some("09:30"));
        assert_eq!(fm.get_str("priority"), Some("high"));
        assert_eq!(fm.get("completed"), None);
        assert_eq!(fm.get("recurrence"), Some(&Value::String("every week".into())));
    }
}
