use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive calendar date range. Construction enforces `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindow", into = "RawWindow")]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvalidWindow { start: format_iso(start), end: format_iso(end) });
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, DomainError> {
        Self::new(parse_iso_date(start)?, parse_iso_date(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_iso(&self) -> String {
        format_iso(self.start)
    }

    pub fn end_iso(&self) -> String {
        format_iso(self.end)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Days covered, counting both ends.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The window ending the day before `self` starts, floored at `floor`.
    /// Returns `None` when nothing lies between `floor` and `self.start`.
    pub fn preceding_from(&self, floor: NaiveDate) -> Option<Self> {
        let end = self.start.checked_sub_days(Days::new(1))?;
        if floor > end {
            return None;
        }
        Some(Self { start: floor, end })
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start_iso(), self.end_iso())
    }
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, DomainError> {
    let trimmed = value.trim();
    // Accept full timestamps and keep the calendar part only.
    let date_part = trimmed.split(['T', ' ']).next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, ISO_DATE_FORMAT)
        .map_err(|_| DomainError::InvalidDate(value.to_string()))
}

pub fn format_iso(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

#[derive(Serialize, Deserialize)]
struct RawWindow {
    start: String,
    end: String,
}

impl TryFrom<RawWindow> for DateWindow {
    type Error = DomainError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        Self::parse(&raw.start, &raw.end)
    }
}

impl From<DateWindow> for RawWindow {
    fn from(window: DateWindow) -> Self {
        Self { start: window.start_iso(), end: window.end_iso() }
    }
}
