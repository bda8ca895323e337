use super::{Interval, IntervalUnit, Position, RecurrenceRule, SpecificDays};
use crate::dates::{
    add_days, add_months, add_months_to_datetime, positional_weekday_in_month, start_of_month,
};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static POSITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"every\s+(first|last)\s+(\w+day)").expect("valid position regex"));
static INTERVAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"every\s+(\d+)?\s*(hour|day|week|month|year)s?").expect("valid interval regex")
});
static WEEKDAYS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bon\s+([\w,\s]+?)(?:\s+from|$)").expect("valid weekdays regex"));
static MONTHDAYS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bon\s+([\d,\s]+?)(?:\s+from|$)").expect("valid monthdays regex"));
static LIST_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\s]+").expect("valid list separator regex"));

const FROM_COMPLETION: &str = "from completion";

fn weekday_number(name: &str) -> Option<u32> {
    match name {
        "sun" | "sunday" => Some(0),
        "mon" | "monday" => Some(1),
        "tue" | "tuesday" => Some(2),
        "wed" | "wednesday" => Some(3),
        "thu" | "thursday" => Some(4),
        "fri" | "friday" => Some(5),
        "sat" | "saturday" => Some(6),
        _ => None,
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    LIST_SEPARATOR_RE
        .split(list)
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// Parses recurrence phrases and computes next occurrences.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecurrenceParser;

impl RecurrenceParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, pattern: &str) -> Option<RecurrenceRule> {
        RecurrenceRule::parse(pattern)
    }

    /// Next occurrence of `pattern` after `base`, or after `completion` when
    /// the rule is anchored on completion and a completion date is given.
    pub fn get_next_date(
        &self,
        base: NaiveDateTime,
        pattern: &str,
        completion: Option<NaiveDateTime>,
    ) -> Option<NaiveDateTime> {
        RecurrenceRule::parse(pattern)?.next_date(base, completion)
    }
}

impl RecurrenceRule {
    /// Case-insensitive, whitespace-tolerant parse. `None` means "not recurring".
    pub fn parse(pattern: &str) -> Option<Self> {
        let normalized = pattern.trim().to_lowercase();
        let mut rule = Self {
            interval: None,
            specific_days: None,
            position: None,
            from_completion: normalized.contains(FROM_COMPLETION),
        };

        if let Some(caps) = POSITION_RE.captures(&normalized) {
            let position = match &caps[1] {
                "first" => Position::First,
                _ => Position::Last,
            };
            if let Some(day) = weekday_number(&caps[2]) {
                rule.position = Some(position);
                rule.specific_days = Some(SpecificDays::Weekdays(vec![day]));
                rule.interval = Some(Interval {
                    value: 1,
                    unit: IntervalUnit::Month,
                });
                return Some(rule);
            }
        }

        if let Some(caps) = INTERVAL_RE.captures(&normalized) {
            let value = caps
                .get(1)
                .and_then(|count| count.as_str().parse().ok())
                .unwrap_or(1);
            if let Some(unit) = IntervalUnit::from_keyword(&caps[2]) {
                rule.interval = Some(Interval { value, unit });
            }
        }

        let weekdays: Vec<u32> = WEEKDAYS_RE
            .captures(&normalized)
            .map(|caps| {
                split_list(caps.get(1).map_or("", |m| m.as_str()))
                    .filter_map(weekday_number)
                    .collect()
            })
            .unwrap_or_default();

        if !weekdays.is_empty() {
            rule.specific_days = Some(SpecificDays::Weekdays(weekdays));
            rule.interval.get_or_insert(Interval {
                value: 1,
                unit: IntervalUnit::Week,
            });
        } else if let Some(caps) = MONTHDAYS_RE.captures(&normalized) {
            let days: Vec<u32> = split_list(caps.get(1).map_or("", |m| m.as_str()))
                .filter_map(|item| item.parse::<u32>().ok())
                .filter(|day| (1..=31).contains(day))
                .collect();
            if !days.is_empty() {
                rule.specific_days = Some(SpecificDays::Monthdays(days));
                rule.interval.get_or_insert(Interval {
                    value: 1,
                    unit: IntervalUnit::Month,
                });
            }
        }

        if rule.interval.is_none() && rule.specific_days.is_none() {
            return None;
        }
        Some(rule)
    }

    /// Next occurrence strictly after the anchor day (interval-only rules
    /// simply add the interval). The anchor's time of day is preserved.
    pub fn next_date(
        &self,
        base: NaiveDateTime,
        completion: Option<NaiveDateTime>,
    ) -> Option<NaiveDateTime> {
        let anchor = match completion {
            Some(completed) if self.from_completion => completed,
            _ => base,
        };
        let time = anchor.time();
        let anchor_day = anchor.date();

        if let (Some(position), Some(SpecificDays::Weekdays(days))) =
            (self.position, &self.specific_days)
        {
            let weekday = *days.first()?;
            let last = position == Position::Last;
            let mut next = positional_weekday_in_month(anchor_day, weekday, last);
            if next <= anchor_day {
                let next_month = start_of_month(add_months(anchor_day, 1));
                next = positional_weekday_in_month(next_month, weekday, last);
            }
            return Some(next.and_time(time));
        }

        let interval = self.interval?;
        match &self.specific_days {
            None => Some(add_interval(anchor, interval)),
            Some(SpecificDays::Weekdays(days)) => {
                if interval.unit != IntervalUnit::Week {
                    return None;
                }
                (1..=7 * i64::from(interval.value))
                    .map(|offset| add_days(anchor_day, offset))
                    .find(|day| days.contains(&day.weekday().num_days_from_sunday()))
                    .map(|day| day.and_time(time))
            }
            Some(SpecificDays::Monthdays(days)) => {
                let mut days = days.clone();
                days.sort_unstable();
                (0..=interval.value)
                    .map(|offset| add_months(anchor_day, i64::from(offset)))
                    .find_map(|month| {
                        days.iter()
                            .filter_map(|day| NaiveDate::from_ymd_opt(month.year(), month.month(), *day))
                            .find(|candidate| *candidate > anchor_day)
                    })
                    .map(|day| day.and_time(time))
            }
        }
    }
}

fn add_interval(anchor: NaiveDateTime, interval: Interval) -> NaiveDateTime {
    let value = i64::from(interval.value);
    let shifted = match interval.unit {
        IntervalUnit::Hour => anchor.checked_add_signed(Duration::hours(value)),
        IntervalUnit::Day => anchor.checked_add_signed(Duration::days(value)),
        IntervalUnit::Week => anchor.checked_add_signed(Duration::weeks(value)),
        IntervalUnit::Month => Some(add_months_to_datetime(anchor, value)),
        IntervalUnit::Year => Some(add_months_to_datetime(anchor, 12 * value)),
    };
    shifted.unwrap_or(anchor)
}
