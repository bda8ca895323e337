//! Free-text recurrence rules for tasks.
//!
//! # Responsibility
//! - Parse phrases such as `every 2 weeks on Mon, Fri from completion`.
//! - Compute the next occurrence after an anchor date.
//!
//! # Invariants
//! - A phrase yielding neither an interval nor specific days is "no rule";
//!   parsing never fails loudly.
//! - Weekday numbers are `0 = Sunday ..= 6 = Saturday`; month days `1..=31`.
//!
//! # See also
//! - `model::journal` for the fixed journal cadence, which is deliberately a
//!   separate representation.

mod parser;

pub use parser::RecurrenceParser;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub value: u32,
    pub unit: IntervalUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "days", rename_all = "lowercase")]
pub enum SpecificDays {
    Weekdays(Vec<u32>),
    Monthdays(Vec<u32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    First,
    Last,
}

/// Structured form of a recurrence phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub interval: Option<Interval>,
    pub specific_days: Option<SpecificDays>,
    pub position: Option<Position>,
    /// Anchor the next occurrence on the completion date.
    pub from_completion: bool,
}
