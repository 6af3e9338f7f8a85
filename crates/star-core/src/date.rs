//! Date keys and the date dimension.
//!
//! A date key is the calendar date written as the integer `yyyymmdd`
//! (2024-03-07 becomes 20240307). The encoding is total on valid dates and
//! [`decode_date_key`] is its exact inverse.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type DateKey = i32;

const DEFAULT_FIRST_DAY: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 1) {
    Some(d) => d,
    None => panic!("invalid default first day"),
};

const DEFAULT_LAST_DAY: NaiveDate = match NaiveDate::from_ymd_opt(2030, 12, 31) {
    Some(d) => d,
    None => panic!("invalid default last day"),
};

pub fn date_key(date: NaiveDate) -> DateKey {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Date key of a timestamp; a missing timestamp has no key.
pub fn date_key_of(ts: Option<NaiveDateTime>) -> Option<DateKey> {
    ts.map(|t| date_key(t.date()))
}

/// Inverse of [`date_key`]. Returns `None` for integers that do not spell a
/// real calendar date (e.g. 20230229).
pub fn decode_date_key(key: DateKey) -> Option<NaiveDate> {
    if key <= 0 {
        return None;
    }
    let year = key / 10_000;
    let month = (key / 100 % 100) as u32;
    let day = (key % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Whole days between the calendar dates of two timestamps.
///
/// Time of day is ignored: a rental taken at 23:59 and returned at 00:01 the
/// next day lasted one day.
pub fn duration_days(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Option<i64> {
    match (start, end) {
        (Some(start), Some(end)) => Some((end.date() - start.date()).num_days()),
        _ => None,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("date range start {start} is after end {end}")]
pub struct DateRangeError {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Inclusive range of days pre-populated into the date dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    first: NaiveDate,
    last: NaiveDate,
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            first: DEFAULT_FIRST_DAY,
            last: DEFAULT_LAST_DAY,
        }
    }
}

impl DateRange {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Result<Self, DateRangeError> {
        if first > last {
            return Err(DateRangeError {
                start: first,
                end: last,
            });
        }
        Ok(Self { first, last })
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    pub fn days(&self) -> usize {
        (self.last - self.first).num_days() as usize + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last;
        self.first.iter_days().take_while(move |d| *d <= last)
    }

    /// One date dimension record per day of the range.
    pub fn records(&self) -> Vec<DimDate> {
        self.iter().map(DimDate::for_date).collect()
    }
}

/// Row of the `dim_date` table; immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimDate {
    pub date_key: DateKey,
    pub date: NaiveDate,
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub day_of_month: u32,
    /// ISO weekday, Monday = 1 .. Sunday = 7.
    pub day_of_week: u32,
    pub is_weekend: bool,
}

impl DimDate {
    pub fn for_date(date: NaiveDate) -> Self {
        let day_of_week = date.weekday().number_from_monday();
        Self {
            date_key: date_key(date),
            date,
            year: date.year(),
            quarter: (date.month() - 1) / 3 + 1,
            month: date.month(),
            day_of_month: date.day(),
            day_of_week,
            is_weekend: day_of_week >= 6,
        }
    }
}
