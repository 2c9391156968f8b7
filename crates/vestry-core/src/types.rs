use chrono::{Datelike, Months, NaiveDate};

use crate::error::{CoreError, CoreResult};

/// Inclusive calendar-date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// ## Summary
    /// Builds a window, returning `None` when `end` precedes `start`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// ## Summary
    /// Builds a window, rejecting an inverted range.
    ///
    /// ## Errors
    /// Returns `CoreError::InvalidInput` when `end` precedes `start`.
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        Self::new(start, end).ok_or_else(|| {
            CoreError::InvalidInput(format!("window end {end} precedes start {start}"))
        })
    }

    /// ## Summary
    /// Returns the window covering the whole calendar month containing `date`.
    #[must_use]
    pub fn month_of(date: NaiveDate) -> Self {
        Self::months_from(date, 1)
    }

    /// ## Summary
    /// Returns the window from the first day of `date`'s month through the last day of
    /// the month `months - 1` later. A `months` of zero is treated as one.
    #[must_use]
    pub fn months_from(date: NaiveDate, months: u32) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let end = start
            .checked_add_months(Months::new(months.max(1)))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX);
        Self { start, end }
    }

    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, both ends included.
    #[must_use]
    pub fn len_days(self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
