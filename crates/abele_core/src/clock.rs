//! Time source abstraction.
//!
//! Debounce windows and "today" stamps go through [`Clock`] so tests can drive
//! time explicitly.

use chrono::{DateTime, Local, NaiveDate};
use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Milliseconds since the unix epoch.
    fn now_millis(&self) -> u64;
    /// Current calendar day.
    fn today(&self) -> NaiveDate;
}

/// Wall clock backed by the system time and local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually advanced clock. `today` is derived from the current millis in UTC.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: Cell::new(start_millis),
        }
    }

    /// Starts the clock at midnight UTC of the given day.
    pub fn at_date(date: NaiveDate) -> Self {
        let millis = date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().timestamp_millis().max(0) as u64)
            .unwrap_or_default();
        Self::new(millis)
    }

    pub fn advance(&self, millis: u64) {
        self.millis.set(self.millis.get().saturating_add(millis));
    }

    pub fn set(&self, millis: u64) {
        self.millis.set(millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.get()
    }

    fn today(&self) -> NaiveDate {
        DateTime::from_timestamp_millis(self.millis.get() as i64)
            .map(|value| value.date_naive())
            .unwrap_or(NaiveDate::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock};
    use chrono::NaiveDate;

    #[test]
    fn manual_clock_advances_and_reports_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        let clock = ManualClock::at_date(day);
        assert_eq!(clock.today(), day);

        clock.advance(24 * 60 * 60 * 1000);
        assert_eq!(clock.today(), day.succ_opt().expect("next day"));
    }
}
