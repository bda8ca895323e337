//! Engine configuration.
//!
//! # Responsibility
//! - Parse the persisted settings document (JSON, camelCase keys).
//! - Build the immutable [`AbeleConfig`] handed to every component.
//!
//! # Invariants
//! - Missing or zero/empty scalar settings fall back to defaults.
//! - Keys the engine does not model are kept and written back unchanged.
//! - Log-note types wrapped in slashes are compiled once; invalid patterns
//!   are logged and never match.

use crate::model::journal::{Journal, JournalSettings};
use chrono::Weekday;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_REFRESH_DELAY_MS: u64 = 300;
pub const DEFAULT_TASKS_FOLDER: &str = "Tasks";
pub const DEFAULT_LOGS_NOTES_TYPES: [&str; 3] = ["journal", "log", "daily"];
pub const DEFAULT_TASKS_TIME_CHOICES: [&str; 4] = ["09:00", "12:00", "18:00", "21:00"];
pub const DEFAULT_TASKS_DATE_CHOICES: [&str; 4] = ["Today", "Tomorrow", "Next Week", "Next Month"];
pub const DEFAULT_TASKS_RECURRENCE_CHOICES: [&str; 4] = ["Daily", "Weekly", "Monthly", "Yearly"];
pub const DEFAULT_BUSY_DAY_THRESHOLD: u32 = 3;
pub const DEFAULT_EXCLUDED_TEMPLATE_PATHS: [&str; 2] = ["attachments/", "templates/"];

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid settings document: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings document as persisted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbeleSettings {
    /// Debounce window of entity reloads, in milliseconds.
    pub refresh_delay: u64,
    pub tasks_folder: String,
    pub logs_notes_types: Vec<String>,
    pub week_starts_on_monday: bool,
    pub journals: Vec<JournalSettings>,
    pub tasks_time_choices: Vec<String>,
    pub tasks_date_choices: Vec<String>,
    pub tasks_recurrence_choices: Vec<String>,
    /// Number of related items from which a day counts as busy.
    pub busy_day_threshold: u32,
    /// Path prefixes where the default template is not applied.
    pub excluded_paths_for_default_template: Vec<String>,
    /// Host-owned keys, such as server credentials.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AbeleSettings {
    fn default() -> Self {
        Self {
            refresh_delay: DEFAULT_REFRESH_DELAY_MS,
            tasks_folder: DEFAULT_TASKS_FOLDER.to_string(),
            logs_notes_types: owned(&DEFAULT_LOGS_NOTES_TYPES),
            week_starts_on_monday: true,
            journals: Vec::new(),
            tasks_time_choices: owned(&DEFAULT_TASKS_TIME_CHOICES),
            tasks_date_choices: owned(&DEFAULT_TASKS_DATE_CHOICES),
            tasks_recurrence_choices: owned(&DEFAULT_TASKS_RECURRENCE_CHOICES),
            busy_day_threshold: DEFAULT_BUSY_DAY_THRESHOLD,
            excluded_paths_for_default_template: owned(&DEFAULT_EXCLUDED_TEMPLATE_PATHS),
            extra: Map::new(),
        }
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl AbeleSettings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct AbeleConfig {
    pub refresh_delay: u64,
    pub tasks_folder: String,
    pub week_start: Weekday,
    pub journals: Vec<Journal>,
    pub tasks_time_choices: Vec<String>,
    pub tasks_date_choices: Vec<String>,
    pub tasks_recurrence_choices: Vec<String>,
    pub busy_day_threshold: u32,
    pub excluded_paths_for_default_template: Vec<String>,
    logs_notes_types: Vec<String>,
    logs_notes_path_patterns: Vec<Regex>,
    extra: Map<String, Value>,
}

impl Default for AbeleConfig {
    fn default() -> Self {
        Self::from_settings(AbeleSettings::default())
    }
}

impl AbeleConfig {
    pub fn from_settings(settings: AbeleSettings) -> Self {
        let week_start = if settings.week_starts_on_monday {
            Weekday::Mon
        } else {
            Weekday::Sun
        };
        let refresh_delay = match settings.refresh_delay {
            0 => DEFAULT_REFRESH_DELAY_MS,
            delay => delay,
        };
        let tasks_folder = match settings.tasks_folder.trim() {
            "" => DEFAULT_TASKS_FOLDER.to_string(),
            folder => folder.to_string(),
        };
        let busy_day_threshold = match settings.busy_day_threshold {
            0 => DEFAULT_BUSY_DAY_THRESHOLD,
            threshold => threshold,
        };
        let logs_notes_path_patterns = compile_path_patterns(&settings.logs_notes_types);

        Self {
            refresh_delay,
            tasks_folder,
            week_start,
            journals: settings
                .journals
                .into_iter()
                .map(|journal| Journal::new(journal, week_start))
                .collect(),
            tasks_time_choices: settings.tasks_time_choices,
            tasks_date_choices: settings.tasks_date_choices,
            tasks_recurrence_choices: settings.tasks_recurrence_choices,
            busy_day_threshold,
            excluded_paths_for_default_template: settings.excluded_paths_for_default_template,
            logs_notes_types: settings.logs_notes_types,
            logs_notes_path_patterns,
            extra: settings.extra,
        }
    }

    pub fn to_settings(&self) -> AbeleSettings {
        AbeleSettings {
            refresh_delay: self.refresh_delay,
            tasks_folder: self.tasks_folder.clone(),
            logs_notes_types: self.logs_notes_types.clone(),
            week_starts_on_monday: self.week_start == Weekday::Mon,
            journals: self.journals.iter().map(Journal::to_settings).collect(),
            tasks_time_choices: self.tasks_time_choices.clone(),
            tasks_date_choices: self.tasks_date_choices.clone(),
            tasks_recurrence_choices: self.tasks_recurrence_choices.clone(),
            busy_day_threshold: self.busy_day_threshold,
            excluded_paths_for_default_template: self.excluded_paths_for_default_template.clone(),
            extra: self.extra.clone(),
        }
    }

    pub fn is_path_excluded_from_default_template(&self, path: &str) -> bool {
        self.excluded_paths_for_default_template
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn logs_notes_types(&self) -> &[String] {
        &self.logs_notes_types
    }

    /// A present note type must be listed literally; without a type the
    /// path is tested against the `/regex/` entries.
    pub fn is_log_type(&self, note_type: Option<&str>, path: &str) -> bool {
        match note_type.filter(|value| !value.is_empty()) {
            Some(note_type) => self.logs_notes_types.iter().any(|t| t == note_type),
            None => self
                .logs_notes_path_patterns
                .iter()
                .any(|pattern| pattern.is_match(path)),
        }
    }

    pub fn default_journals(&self) -> impl Iterator<Item = &Journal> {
        self.journals.iter().filter(|journal| journal.is_default)
    }

    pub fn journal(&self, id: &str) -> Option<&Journal> {
        self.journals.iter().find(|journal| journal.id == id)
    }
}

fn compile_path_patterns(types: &[String]) -> Vec<Regex> {
    types
        .iter()
        .filter(|value| value.len() >= 2 && value.starts_with('/') && value.ends_with('/'))
        .filter_map(|value| match Regex::new(&value[1..value.len() - 1]) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(
                    "event=log_type_regex module=config status=invalid pattern={} error={}",
                    value,
                    err.to_string().replace('\n', " ")
                );
                None
            }
        })
        .collect()
}
