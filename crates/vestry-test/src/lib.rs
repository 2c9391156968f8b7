//! Vestry back office - test support.
//!
//! Provides an in-memory occurrence store that behaves like the unique
//! `(event_id, occurrence_date)` index, and rule fixtures shared by the tests.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;
use vestry_core::types::DateWindow;
use vestry_db::model::event::RecurrencePattern;
use vestry_db::model::event::occurrence::NewEventOccurrence;
use vestry_service::error::ServiceResult;
use vestry_service::events::generate::OccurrenceStore;
use vestry_service::events::rule::RecurrenceRule;

/// Stored row plus the fields only an administrator edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryOccurrence {
    pub row: NewEventOccurrence,
    pub leader_id: Option<Uuid>,
    pub notes: String,
    pub is_cancelled: bool,
}

/// Occurrence store backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryOccurrenceStore {
    rows: BTreeMap<(Uuid, NaiveDate), MemoryOccurrence>,
    inserts: usize,
}

impl MemoryOccurrenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dates stored for an event, ascending.
    #[must_use]
    pub fn dates(&self, event_id: Uuid) -> Vec<NaiveDate> {
        self.rows
            .keys()
            .filter(|(id, _)| *id == event_id)
            .map(|(_, date)| *date)
            .collect()
    }

    #[must_use]
    pub fn get(&self, event_id: Uuid, date: NaiveDate) -> Option<&MemoryOccurrence> {
        self.rows.get(&(event_id, date))
    }

    /// Hand edit of an existing row; `false` when no row exists on that date.
    pub fn edit(
        &mut self,
        event_id: Uuid,
        date: NaiveDate,
        apply: impl FnOnce(&mut MemoryOccurrence),
    ) -> bool {
        self.rows
            .get_mut(&(event_id, date))
            .map(apply)
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows inserted over the store's lifetime.
    #[must_use]
    pub fn total_inserts(&self) -> usize {
        self.inserts
    }
}

impl OccurrenceStore for MemoryOccurrenceStore {
    async fn insert_if_absent(&mut self, occurrence: &NewEventOccurrence) -> ServiceResult<bool> {
        let key = (occurrence.event_id, occurrence.occurrence_date);
        if self.rows.contains_key(&key) {
            return Ok(false);
        }
        self.rows.insert(
            key,
            MemoryOccurrence {
                row: occurrence.clone(),
                leader_id: None,
                notes: String::new(),
                is_cancelled: false,
            },
        );
        self.inserts += 1;
        Ok(true)
    }

    async fn delete_in_window(&mut self, event_id: Uuid, window: DateWindow) -> ServiceResult<usize> {
        let before = self.rows.len();
        self.rows
            .retain(|(id, date), _| *id != event_id || !window.contains(*date));
        Ok(before - self.rows.len())
    }
}

/// ## Summary
/// Builds a calendar date.
///
/// ## Panics
/// Panics on an invalid date; fixtures are written by hand.
#[expect(clippy::expect_used, reason = "fixture dates are literals")]
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// ## Summary
/// Builds a rule with a 10:00-11:30 anchor and no end bounds.
///
/// ## Panics
/// Never in practice; the anchor times are literals.
#[expect(clippy::expect_used, reason = "fixture times are literals")]
#[must_use]
pub fn rule(
    pattern: RecurrencePattern,
    weekday: Option<Weekday>,
    start_date: NaiveDate,
) -> RecurrenceRule {
    RecurrenceRule {
        event_id: Uuid::new_v4(),
        pattern: Some(pattern),
        weekday,
        start_date,
        end_date: None,
        recurrence_until: None,
        anchor_start_time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
        anchor_end_time: NaiveTime::from_hms_opt(11, 30, 0),
    }
}

/// Sunday service anchored on Monday 2024-01-01.
#[must_use]
pub fn sunday_service() -> RecurrenceRule {
    rule(
        RecurrencePattern::Weekly,
        Some(Weekday::Sun),
        date(2024, 1, 1),
    )
}

/// ## Summary
/// Builds an inclusive window.
///
/// ## Panics
/// Panics when `end` precedes `start`.
#[expect(clippy::expect_used, reason = "fixture windows are literals")]
#[must_use]
pub fn window(start: NaiveDate, end: NaiveDate) -> DateWindow {
    DateWindow::new(start, end).expect("ordered fixture window")
}
