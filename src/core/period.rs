//! Calendar month periods.
//!
//! Every summary, lock and balance is keyed by a flat plus a [`MonthPeriod`]. The
//! period owns its date bounds so ledger queries never recompute them.

use crate::errors::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Earliest year the ledger accepts.
pub const MIN_YEAR: i32 = 2020;
/// Latest year the ledger accepts.
pub const MAX_YEAR: i32 = 2099;

/// A validated (year, month) pair with its first and last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MonthPeriod {
    year: i32,
    month: u32,
    #[serde(skip)]
    first_day: NaiveDate,
    #[serde(skip)]
    last_day: NaiveDate,
}

impl MonthPeriod {
    /// Builds a period, rejecting years outside `MIN_YEAR..=MAX_YEAR` and months
    /// outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::invalid(format!(
                "year {year} is outside {MIN_YEAR}..={MAX_YEAR}"
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::invalid(format!("month {month} is outside 1..=12")));
        }

        let first_day = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::invalid(format!("invalid month {year}-{month:02}")))?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let last_day = next_first
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| Error::invalid(format!("invalid month {year}-{month:02}")))?;

        Ok(Self {
            year,
            month,
            first_day,
            last_day,
        })
    }

    /// The period a ledger date is accounted to.
    pub fn containing(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), date.month())
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Month number, 1-12.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Month number in the signed form stored in the database.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // month is 1..=12
    pub const fn db_month(&self) -> i32 {
        self.month as i32
    }

    /// First day of the month.
    #[must_use]
    pub const fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// Last day of the month.
    #[must_use]
    pub const fn last_day(&self) -> NaiveDate {
        self.last_day
    }

    /// Whether `date` falls inside the month.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_day <= date && date <= self.last_day
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthPeriod {
    type Err = Error;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| Error::invalid(format!("expected YYYY-MM, got `{s}`")))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| Error::invalid(format!("invalid year in `{s}`")))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| Error::invalid(format!("invalid month in `{s}`")))?;
        Self::new(year, month)
    }
}
