//! Recurring note series ("journals").
//!
//! # Responsibility
//! - Decide whether a note is an instance of this journal and on which date.
//! - Step between instance dates and snap them to the configured day of
//!   period.
//! - Probe for existing instances within a bounded number of periods.
//!
//! # Invariants
//! - `day_of_period` is either `first`, `last` or a number in `1..=366`;
//!   invalid assignments are dropped and the previous value is kept.
//! - Nearest-instance search probes at most [`MAX_PERIODS_TO_CHECK`] periods.
//! - An invalid `/regex/` type never matches any path.

use crate::dates::{
    add_days, add_months, days_in_month, end_of_month, end_of_week, end_of_year,
    extract_date_from_filename, format_date, parse_date, start_of_month, start_of_week,
    start_of_year,
};
use crate::host::VaultHost;
use crate::paths::{file_name_from_path, normalize_path};
use crate::template::{create_note_from_template, render_template, TemplateData, TemplateError};
use chrono::{Datelike, NaiveDate, Weekday};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Upper bound of periods walked by the nearest-instance search.
pub const MAX_PERIODS_TO_CHECK: usize = 100;

const DAY_OF_PERIOD_MAX: f64 = 366.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalRecurrence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOfPeriod {
    First,
    Last,
    /// One-based day within the period.
    Nth(u16),
}

/// `dayOfPeriod` as persisted: `"first"`, `"last"` or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DayOfPeriodValue {
    Number(f64),
    Text(String),
}

impl DayOfPeriod {
    /// Validates a persisted value. Returns `None` for anything out of contract.
    pub fn from_value(value: &DayOfPeriodValue) -> Option<Self> {
        match value {
            DayOfPeriodValue::Text(text) if text == "first" => Some(Self::First),
            DayOfPeriodValue::Text(text) if text == "last" => Some(Self::Last),
            DayOfPeriodValue::Number(number)
                if number.fract() == 0.0 && (1.0..=DAY_OF_PERIOD_MAX).contains(number) =>
            {
                Some(Self::Nth(*number as u16))
            }
            _ => None,
        }
    }

    pub fn to_value(self) -> DayOfPeriodValue {
        match self {
            Self::First => DayOfPeriodValue::Text("first".to_string()),
            Self::Last => DayOfPeriodValue::Text("last".to_string()),
            Self::Nth(day) => DayOfPeriodValue::Number(f64::from(day)),
        }
    }
}

/// Persisted journal definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    /// Frontmatter type, or a `/regex/` tested against the note path.
    #[serde(rename = "type")]
    pub note_type: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path_template: Option<String>,
    pub recurrence: JournalRecurrence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_period: Option<DayOfPeriodValue>,
}

#[derive(Debug, Clone)]
enum TypeMatcher {
    Frontmatter(String),
    Path(Regex),
    Invalid,
}

#[derive(Debug, Clone)]
pub struct Journal {
    pub id: String,
    pub name: String,
    pub note_type: String,
    pub is_default: bool,
    pub date_property: Option<String>,
    pub template_path: Option<String>,
    pub new_path_template: Option<String>,
    pub recurrence: JournalRecurrence,
    day_of_period: Option<DayOfPeriod>,
    week_start: Weekday,
    matcher: TypeMatcher,
}

impl PartialEq for Journal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Journal {
    pub fn new(settings: JournalSettings, week_start: Weekday) -> Self {
        let matcher = build_matcher(&settings.note_type);
        let mut journal = Self {
            id: settings
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: settings.name,
            note_type: settings.note_type,
            is_default: settings.is_default,
            date_property: settings.date_property.filter(|value| !value.is_empty()),
            template_path: settings.template_path.filter(|value| !value.is_empty()),
            new_path_template: settings.new_path_template.filter(|value| !value.is_empty()),
            recurrence: settings.recurrence,
            day_of_period: None,
            week_start,
            matcher,
        };
        if let Some(value) = &settings.day_of_period {
            journal.set_day_of_period(value);
        }
        journal
    }

    pub fn to_settings(&self) -> JournalSettings {
        JournalSettings {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            note_type: self.note_type.clone(),
            is_default: self.is_default,
            date_property: self.date_property.clone(),
            template_path: self.template_path.clone(),
            new_path_template: self.new_path_template.clone(),
            recurrence: self.recurrence,
            day_of_period: self.day_of_period.map(DayOfPeriod::to_value),
        }
    }

    pub fn day_of_period(&self) -> Option<DayOfPeriod> {
        self.day_of_period
    }

    /// Assigns a new day of period; invalid values are ignored.
    pub fn set_day_of_period(&mut self, value: &DayOfPeriodValue) {
        match DayOfPeriod::from_value(value) {
            Some(day) => self.day_of_period = Some(day),
            None => debug!(
                "event=journal_day_of_period module=journal status=rejected journal={} value={:?}",
                self.id, value
            ),
        }
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn is_default_daily_journal(&self) -> bool {
        self.is_default && self.recurrence == JournalRecurrence::Daily
    }

    /// Returns the instance date when the note at `path` belongs to this journal.
    pub fn check_if_note_path_is_journal(&self, host: &dyn VaultHost, path: &str) -> Option<NaiveDate> {
        let path = normalize_path(path);
        if !host.file_exists(&path) {
            return None;
        }
        let frontmatter = host.frontmatter(&path);

        match &self.matcher {
            TypeMatcher::Path(regex) => {
                if !regex.is_match(&path) {
                    return None;
                }
            }
            TypeMatcher::Frontmatter(expected) => {
                let actual = frontmatter.as_ref().and_then(|fm| fm.note_type());
                if actual != Some(expected.as_str()) {
                    return None;
                }
            }
            TypeMatcher::Invalid => return None,
        }

        match &self.date_property {
            Some(property) => frontmatter
                .as_ref()
                .and_then(|fm| fm.get_str(property))
                .and_then(parse_date),
            None => extract_date_from_filename(file_name_from_path(&path)),
        }
    }

    pub fn get_next_date(&self, from: NaiveDate) -> NaiveDate {
        self.snap(self.shift(from, 1))
    }

    pub fn get_prev_date(&self, from: NaiveDate) -> NaiveDate {
        self.snap(self.shift(from, -1))
    }

    pub fn is_journal_date(&self, date: NaiveDate) -> bool {
        if self.recurrence == JournalRecurrence::Daily {
            return true;
        }
        if self.day_of_period.is_none() {
            return false;
        }
        self.snap(date) == date
    }

    /// Path of the instance note for `date`, rendered from `new_path_template`.
    pub fn note_path_for(&self, date: NaiveDate) -> Option<String> {
        let template = self.new_path_template.as_deref()?;
        Some(normalize_path(&render_template(template, &date_data(date))))
    }

    pub fn is_journal_note_created(&self, host: &dyn VaultHost, date: NaiveDate) -> bool {
        self.note_path_for(date)
            .map(|path| host.file_exists(&path))
            .unwrap_or(false)
    }

    pub fn find_closest_prev_note(&self, host: &dyn VaultHost, date: NaiveDate) -> Option<NaiveDate> {
        self.find_closest_note(host, date, -1)
    }

    pub fn find_closest_next_note(&self, host: &dyn VaultHost, date: NaiveDate) -> Option<NaiveDate> {
        self.find_closest_note(host, date, 1)
    }

    /// Creates the instance note for `date`. Returns `Ok(None)` if it exists.
    pub fn create_journal_note(
        &self,
        host: &dyn VaultHost,
        date: NaiveDate,
    ) -> Result<Option<String>, TemplateError> {
        create_note_from_template(
            host,
            &date_data(date),
            self.new_path_template.as_deref(),
            self.template_path.as_deref(),
        )
    }

    fn find_closest_note(&self, host: &dyn VaultHost, mut date: NaiveDate, step: i64) -> Option<NaiveDate> {
        for _ in 0..MAX_PERIODS_TO_CHECK {
            date = if step < 0 {
                self.get_prev_date(date)
            } else {
                self.get_next_date(date)
            };
            if self.is_journal_note_created(host, date) {
                return Some(date);
            }
        }
        debug!(
            "event=journal_search module=journal status=exhausted journal={} periods={}",
            self.id, MAX_PERIODS_TO_CHECK
        );
        None
    }

    fn shift(&self, date: NaiveDate, step: i64) -> NaiveDate {
        match self.recurrence {
            JournalRecurrence::Daily => add_days(date, step),
            JournalRecurrence::Weekly => add_days(date, 7 * step),
            JournalRecurrence::Monthly => add_months(date, step),
            JournalRecurrence::Yearly => add_months(date, 12 * step),
        }
    }

    /// Moves `date` onto the configured day of its period. Numeric days past
    /// the end of a month or year clamp to its last day.
    fn snap(&self, date: NaiveDate) -> NaiveDate {
        let Some(day) = self.day_of_period else {
            return date;
        };

        match (self.recurrence, day) {
            (JournalRecurrence::Daily, _) => date,
            (JournalRecurrence::Yearly, DayOfPeriod::First) => start_of_year(date),
            (JournalRecurrence::Yearly, DayOfPeriod::Last) => end_of_year(date),
            (JournalRecurrence::Yearly, DayOfPeriod::Nth(n)) => {
                add_days(start_of_year(date), i64::from(n) - 1).min(end_of_year(date))
            }
            (JournalRecurrence::Monthly, DayOfPeriod::First) => start_of_month(date),
            (JournalRecurrence::Monthly, DayOfPeriod::Last) => end_of_month(date),
            (JournalRecurrence::Monthly, DayOfPeriod::Nth(n)) => {
                let day = u32::from(n).min(days_in_month(date));
                date.with_day(day).unwrap_or(date)
            }
            (JournalRecurrence::Weekly, DayOfPeriod::First) => start_of_week(date, self.week_start),
            (JournalRecurrence::Weekly, DayOfPeriod::Last) => end_of_week(date, self.week_start),
            (JournalRecurrence::Weekly, DayOfPeriod::Nth(n)) => add_days(
                start_of_week(date, self.week_start),
                (i64::from(n) - 1) % 7,
            ),
        }
    }
}

fn date_data(date: NaiveDate) -> TemplateData {
    let mut data = TemplateData::new();
    data.insert("date".to_string(), format_date(date));
    data
}

fn build_matcher(note_type: &str) -> TypeMatcher {
    let Some(rest) = note_type.strip_prefix('/') else {
        return TypeMatcher::Frontmatter(note_type.to_string());
    };
    let pattern = rest.strip_suffix('/').unwrap_or(rest);

    match Regex::new(pattern) {
        Ok(regex) => TypeMatcher::Path(regex),
        Err(err) => {
            warn!(
                "event=journal_type_regex module=journal status=invalid pattern={} error={}",
                note_type,
                err.to_string().replace('\n', " ")
            );
            TypeMatcher::Invalid
        }
    }
}
