//! Recurrence rules and the pure date enumeration behind occurrence generation.
//!
//! Everything in this module is storage-free: a [`RecurrenceRule`] plus a
//! [`DateWindow`] fully determines the dates that should exist.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;
use vestry_core::types::DateWindow;
use vestry_db::model::event::occurrence::NewEventOccurrence;
use vestry_db::model::event::{Event, RecurrencePattern};

use crate::error::{ServiceError, ServiceResult};

/// Recurrence settings of one event.
///
/// `pattern` is `None` for events that do not repeat, including events whose
/// recurring flag is off while a stale pattern is still stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub event_id: Uuid,
    pub pattern: Option<RecurrencePattern>,
    /// Day of the week for weekly and biweekly patterns.
    pub weekday: Option<Weekday>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Hard ceiling: no occurrence is ever dated after it.
    pub recurrence_until: Option<NaiveDate>,
    pub anchor_start_time: NaiveTime,
    pub anchor_end_time: Option<NaiveTime>,
}

/// ## Summary
/// Converts a stored weekday index (0 = Monday) to a `Weekday`.
#[must_use]
pub fn weekday_from_index(index: i16) -> Option<Weekday> {
    u8::try_from(index)
        .ok()
        .and_then(|index| Weekday::try_from(index).ok())
}

/// ## Summary
/// Converts a `Weekday` to its stored index (0 = Monday).
#[must_use]
pub fn weekday_index(weekday: Weekday) -> i16 {
    match weekday {
        Weekday::Mon => 0,
        Weekday::Tue => 1,
        Weekday::Wed => 2,
        Weekday::Thu => 3,
        Weekday::Fri => 4,
        Weekday::Sat => 5,
        Weekday::Sun => 6,
    }
}

/// ## Summary
/// Moves `date` forward by `months` calendar months, placing it on `anchor_day`
/// clamped to the length of the target month.
///
/// Month arithmetic is done on the (year, month) pair, never as a day count, so
/// `2021-01-31 + 1` is `2021-02-28` and `2021-01-31 + 2` is `2021-03-31`.
///
/// Returns `None` when the result falls outside the supported calendar.
#[must_use]
pub fn add_months_clamped(date: NaiveDate, months: u32, anchor_day: u32) -> Option<NaiveDate> {
    let month_index = date
        .year()
        .checked_mul(12)?
        .checked_add(i32::try_from(date.month0()).ok()?)?
        .checked_add(i32::try_from(months).ok()?)?;
    let year = month_index.div_euclid(12);
    let month = u32::try_from(month_index.rem_euclid(12)).ok()? + 1;
    let day = anchor_day.clamp(1, days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|first| u32::from(first.num_days_in_month()))
}

/// Whole calendar months from `from`'s month to `to`'s month; negative when `to` is earlier.
fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (i64::from(to.year()) - i64::from(from.year())) * 12 + i64::from(to.month())
        - i64::from(from.month())
}

impl RecurrenceRule {
    /// ## Summary
    /// Extracts the recurrence rule of a stored event.
    ///
    /// ## Errors
    /// Returns `ServiceError::ValidationError` when the stored weekday is outside 0–6.
    pub fn from_event(event: &Event) -> ServiceResult<Self> {
        let weekday = event
            .recurrence_weekday
            .map(|index| {
                weekday_from_index(index).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Recurrence weekday {index} is outside 0-6."
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            event_id: event.id,
            pattern: event
                .recurrence_pattern
                .filter(|_| event.is_recurring),
            weekday,
            start_date: event.start_date,
            end_date: event.end_date,
            recurrence_until: event.recurrence_until,
            anchor_start_time: event.start_time,
            anchor_end_time: event.end_time,
        })
    }

    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.pattern.is_some()
    }

    /// ## Summary
    /// Checks the rule before any occurrence is generated from it.
    ///
    /// ## Errors
    /// Returns `ServiceError::ValidationError` when a weekly or biweekly rule has no weekday.
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(pattern) = self.pattern
            && pattern.needs_weekday()
            && self.weekday.is_none()
        {
            return Err(ServiceError::ValidationError(
                "Select a recurrence day for weekly or bi-weekly events.".to_string(),
            ));
        }
        Ok(())
    }

    /// ## Summary
    /// Checks a date entered by hand for an occurrence of this rule's event.
    ///
    /// ## Errors
    /// Returns `ServiceError::ValidationError` when the event does not recur, has no
    /// recurrence end date, or the date lies outside `[start_date, recurrence_until]`.
    pub fn validate_manual_date(&self, date: NaiveDate) -> ServiceResult<()> {
        if !self.is_recurring() {
            return Err(ServiceError::ValidationError(
                "Occurrences can only be edited when the event is recurring.".to_string(),
            ));
        }
        let Some(until) = self.recurrence_until else {
            return Err(ServiceError::ValidationError(
                "Set a recurrence end date before adding occurrences.".to_string(),
            ));
        };
        if date < self.start_date {
            return Err(ServiceError::ValidationError(
                "Occurrence date cannot be earlier than event start date.".to_string(),
            ));
        }
        if date > until {
            return Err(ServiceError::ValidationError(
                "Occurrence date cannot be later than recurrence end date.".to_string(),
            ));
        }
        Ok(())
    }

    /// ## Summary
    /// Resolves an optional caller window against the rule's own dates.
    ///
    /// A missing start defaults to `start_date`; a missing end defaults to
    /// `recurrence_until`, then `end_date`, then `start_date`. Returns `None` when the
    /// resolved end precedes the start.
    #[must_use]
    pub fn resolve_window(
        &self,
        range_start: Option<NaiveDate>,
        range_end: Option<NaiveDate>,
    ) -> Option<DateWindow> {
        let start = range_start.unwrap_or(self.start_date);
        let end = range_end.unwrap_or_else(|| {
            self.recurrence_until
                .or(self.end_date)
                .unwrap_or(self.start_date)
        });
        DateWindow::new(start, end)
    }

    /// ## Summary
    /// Returns the first cursor of the rule: `start_date`, moved forward 0–6 days onto
    /// the configured weekday for weekly and biweekly patterns.
    #[must_use]
    pub fn first_cursor(&self) -> Option<NaiveDate> {
        match (self.pattern, self.weekday) {
            (Some(pattern), Some(weekday)) if pattern.needs_weekday() => {
                let offset = (7 + weekday.num_days_from_monday()
                    - self.start_date.weekday().num_days_from_monday())
                    % 7;
                self.start_date
                    .checked_add_days(Days::new(u64::from(offset)))
            }
            _ => Some(self.start_date),
        }
    }

    /// ## Summary
    /// Returns the cursor following `cursor`, or `None` when the rule does not recur
    /// or the calendar runs out.
    ///
    /// Monthly steps land on the day-of-month of `start_date`, clamped per month.
    #[must_use]
    pub fn next_after(&self, cursor: NaiveDate) -> Option<NaiveDate> {
        let pattern = self.pattern?;
        match pattern.period_days() {
            Some(days) => cursor.checked_add_days(Days::new(days)),
            None => add_months_clamped(cursor, 1, self.start_date.day()),
        }
    }

    /// ## Summary
    /// Jumps `cursor` straight to the first rule date on or after `target`.
    ///
    /// Fixed-period patterns jump by whole periods; monthly jumps by whole months and
    /// then takes single clamped steps. Only a handful of successor steps run no
    /// matter how far `target` is from `cursor`.
    #[must_use]
    pub fn fast_forward(&self, cursor: NaiveDate, target: NaiveDate) -> Option<NaiveDate> {
        if cursor >= target {
            return Some(cursor);
        }
        let pattern = self.pattern?;

        let mut candidate = match pattern.period_days() {
            Some(period) => {
                let gap = u64::try_from((target - cursor).num_days()).ok()?;
                cursor.checked_add_days(Days::new(gap / period * period))?
            }
            None => match u32::try_from(months_between(cursor, target)) {
                Ok(months) if months > 0 => {
                    add_months_clamped(cursor, months, self.start_date.day())?
                }
                _ => cursor,
            },
        };

        while candidate < target {
            candidate = self.next_after(candidate)?;
        }
        Some(candidate)
    }

    /// ## Summary
    /// Enumerates the rule's dates inside `window`, in ascending order.
    ///
    /// Dates before `window.start` or after `recurrence_until` are never yielded.
    #[must_use]
    pub fn occurrences(&self, window: DateWindow) -> OccurrenceDates<'_> {
        let cursor = if self.is_recurring() {
            self.first_cursor()
                .and_then(|first| self.fast_forward(first, window.start))
        } else {
            None
        };
        OccurrenceDates {
            rule: self,
            window,
            cursor,
        }
    }

    /// Row to insert for `date`, carrying the rule's anchor times.
    #[must_use]
    pub fn new_occurrence(&self, date: NaiveDate) -> NewEventOccurrence {
        NewEventOccurrence {
            event_id: self.event_id,
            occurrence_date: date,
            start_time: self.anchor_start_time,
            end_time: self.anchor_end_time,
        }
    }
}

/// Iterator over the dates of a rule inside a window.
#[derive(Debug, Clone)]
pub struct OccurrenceDates<'a> {
    rule: &'a RecurrenceRule,
    window: DateWindow,
    cursor: Option<NaiveDate>,
}

impl Iterator for OccurrenceDates<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            let date = self.cursor.filter(|date| *date <= self.window.end)?;
            if self
                .rule
                .recurrence_until
                .is_some_and(|until| date > until)
            {
                // Cursor only moves forward, nothing later can qualify.
                self.cursor = None;
                return None;
            }
            self.cursor = self.rule.next_after(date);
            if date >= self.window.start {
                return Some(date);
            }
        }
    }
}
