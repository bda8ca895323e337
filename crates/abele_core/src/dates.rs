//! Calendar arithmetic shared by the recurrence engine and journals.
//!
//! # Responsibility
//! - Parse frontmatter/file-name dates in the vault's `YYYY-MM-DD` format.
//! - Provide month/week/year arithmetic with end-of-month clamping.
//!
//! # Invariants
//! - Month arithmetic never overflows into the following month: adding one
//!   month to Jan 31 yields the last day of February.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

/// `chrono` format of the vault's canonical date representation.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// `chrono` format of the `dateTime`/`dueTime` frontmatter values.
pub const TIME_FORMAT: &str = "%H:%M";

static LEADING_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid leading date regex"));
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid date regex"));

/// Parses a `YYYY-MM-DD` prefixed value. Trailing time parts are ignored.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let caps = LEADING_DATE_RE.captures(value.trim())?;
    date_from_captures(&caps)
}

/// Parses a `HH:mm` time.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).ok()
}

/// Combines a date and a `HH:mm` time when both parse.
pub fn parse_date_time(date: &str, time: &str) -> Option<NaiveDateTime> {
    Some(parse_date(date)?.and_time(parse_time(time)?))
}

/// Finds the first `YYYY-MM-DD` occurrence in a file name.
pub fn extract_date_from_filename(file_name: &str) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(file_name)?;
    date_from_captures(&caps)
}

fn date_from_captures(caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let day = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Shifts a date by whole months, clamping to the last day of the target month.
pub fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    let magnitude = Months::new(months.unsigned_abs().min(u32::MAX as u64) as u32);
    let shifted = if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    };
    shifted.unwrap_or(date)
}

/// Same as [`add_months`] for date-times; the time of day is preserved.
pub fn add_months_to_datetime(value: NaiveDateTime, months: i64) -> NaiveDateTime {
    add_months(value.date(), months).and_time(value.time())
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let next_month_start = add_months(start_of_month(date), 1);
    next_month_start.pred_opt().unwrap_or(date)
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    end_of_month(date).day()
}

pub fn start_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date)
}

pub fn end_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date)
}

/// First day of the week containing `date`, for the configured week start.
pub fn start_of_week(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = days_since_week_start(date, week_start);
    add_days(date, -(offset as i64))
}

pub fn end_of_week(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    add_days(start_of_week(date, week_start), 6)
}

/// Zero-based position of `date` inside its week.
pub fn days_since_week_start(date: NaiveDate, week_start: Weekday) -> u32 {
    (date.weekday().num_days_from_sunday() + 7 - week_start.num_days_from_sunday()) % 7
}

/// Finds the first or last occurrence of a weekday (0 = Sunday) in the month of `date`.
pub fn positional_weekday_in_month(date: NaiveDate, weekday: u32, last: bool) -> NaiveDate {
    if last {
        let end = end_of_month(date);
        let back = (end.weekday().num_days_from_sunday() + 7 - weekday % 7) % 7;
        add_days(end, -(back as i64))
    } else {
        let start = start_of_month(date);
        let forward = (weekday % 7 + 7 - start.weekday().num_days_from_sunday()) % 7;
        add_days(start, forward as i64)
    }
}
