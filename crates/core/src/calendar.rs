//! Day-by-day quantity schedule of one order line within its plan month.
//!
//! Every check on day validity goes through [`days_in_month`], so a
//! February entry for day 29 only exists in leap years and auto-fill never
//! runs past the last real day of the month.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::line::CalendarEntry;
use crate::domain::plan::PlanPeriod;
use crate::errors::LineError;

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` of `year`; zero for a month outside 1..=12.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Day of month, serialized as a two-digit string (`"01"`..`"31"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDay(u32);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not a day of month")]
pub struct InvalidCalendarDay(pub String);

impl CalendarDay {
    pub fn number(&self) -> u32 {
        self.0
    }

    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.bytes().all(|b| b.is_ascii_digit());
        if trimmed.is_empty() || trimmed.len() > 2 || !digits {
            return None;
        }
        trimmed.parse::<u32>().ok().filter(|day| (1..=31).contains(day)).map(Self)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl TryFrom<String> for CalendarDay {
    type Error = InvalidCalendarDay;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(InvalidCalendarDay(value))
    }
}

impl From<CalendarDay> for String {
    fn from(day: CalendarDay) -> Self {
        day.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarAllocation {
    period: PlanPeriod,
    entries: BTreeMap<CalendarDay, Decimal>,
}

impl CalendarAllocation {
    pub fn new(period: PlanPeriod) -> Self {
        Self { period, entries: BTreeMap::new() }
    }

    /// Rebuilds an allocation from persisted entries, which must all fall
    /// on days of `period`.
    pub fn from_entries(
        period: PlanPeriod,
        entries: impl IntoIterator<Item = CalendarEntry>,
    ) -> Result<Self, LineError> {
        let mut allocation = Self::new(period);
        for entry in entries {
            allocation.set_quantity(entry.day, entry.quantity)?;
        }
        Ok(allocation)
    }

    pub fn period(&self) -> PlanPeriod {
        self.period
    }

    pub fn days_in_month(&self) -> u32 {
        self.period.days_in_month()
    }

    /// Resolves user input such as `"7"` or `"07"` to a day of this month.
    pub fn resolve_day(&self, raw: &str) -> Result<CalendarDay, LineError> {
        CalendarDay::parse(raw)
            .filter(|day| self.is_valid_day(*day))
            .ok_or_else(|| self.out_of_range(raw.trim()))
    }

    pub fn is_valid_day(&self, day: CalendarDay) -> bool {
        (1..=self.days_in_month()).contains(&day.0)
    }

    pub fn set_quantity(&mut self, day: CalendarDay, quantity: Decimal) -> Result<(), LineError> {
        if !self.is_valid_day(day) {
            return Err(self.out_of_range(&day.to_string()));
        }
        ensure_non_negative(day, quantity)?;
        self.entries.insert(day, quantity);
        Ok(())
    }

    /// Sets `day` and, when `enabled`, copies the quantity to every later day
    /// of the month, overwriting existing entries.
    pub fn auto_fill_forward(
        &mut self,
        day: CalendarDay,
        quantity: Decimal,
        enabled: bool,
    ) -> Result<(), LineError> {
        self.set_quantity(day, quantity)?;
        if enabled {
            for next in (day.0 + 1)..=self.days_in_month() {
                self.entries.insert(CalendarDay(next), quantity);
            }
        }
        Ok(())
    }

    pub fn quantity(&self, day: CalendarDay) -> Option<Decimal> {
        self.entries.get(&day).copied()
    }

    pub fn remove(&mut self, day: CalendarDay) -> Option<Decimal> {
        self.entries.remove(&day)
    }

    pub fn total_quantity(&self) -> Result<Decimal, LineError> {
        self.entries
            .iter()
            .filter(|(day, _)| self.is_valid_day(**day))
            .try_fold(Decimal::ZERO, |total, (_, quantity)| total.checked_add(*quantity))
            .ok_or(LineError::Overflow { stage: "total quantity" })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Moves the allocation to another plan month without discarding entries.
    pub fn retarget(&mut self, period: PlanPeriod) {
        self.period = period;
    }

    /// Entries on valid days of the current month, ordered by day.
    pub fn entries(&self) -> Vec<CalendarEntry> {
        self.entries
            .iter()
            .filter(|(day, _)| self.is_valid_day(**day))
            .map(|(day, quantity)| CalendarEntry { day: *day, quantity: *quantity })
            .collect()
    }

    pub fn stale_entries(&self) -> Vec<CalendarEntry> {
        self.entries
            .iter()
            .filter(|(day, _)| !self.is_valid_day(**day))
            .map(|(day, quantity)| CalendarEntry { day: *day, quantity: *quantity })
            .collect()
    }

    /// Dates of every valid day in the month, for weekday labelling.
    pub fn days(&self) -> Vec<NaiveDate> {
        let (year, month) = (self.period.year(), self.period.month());
        (1..=self.days_in_month())
            .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
            .collect()
    }

    fn out_of_range(&self, day: &str) -> LineError {
        LineError::OutOfRangeDay {
            day: day.to_owned(),
            year: self.period.year(),
            month: self.period.month(),
            days_in_month: self.days_in_month(),
        }
    }
}

fn ensure_non_negative(day: CalendarDay, quantity: Decimal) -> Result<(), LineError> {
    if quantity < Decimal::ZERO {
        return Err(LineError::NegativeQuantity { day: day.to_string(), quantity });
    }
    Ok(())
}
