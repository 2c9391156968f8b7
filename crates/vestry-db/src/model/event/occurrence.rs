//! Models for materialized event occurrences.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::{pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};

use crate::db::schema::event_occurrence;

/// One concrete date of a recurring event.
///
/// Rows are keyed by `(event_id, occurrence_date)` and are only ever inserted by the
/// recurrence expander; leader, notes and cancellation are edited by hand afterwards.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Queryable,
    Selectable,
    Identifiable,
    Associations,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = event_occurrence)]
#[diesel(check_for_backend(Pg))]
#[diesel(belongs_to(super::Event, foreign_key = event_id))]
pub struct EventOccurrence {
    pub id: uuid::Uuid,
    pub event_id: uuid::Uuid,
    pub occurrence_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    /// Member leading this occurrence.
    pub leader_id: Option<uuid::Uuid>,
    pub is_cancelled: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventOccurrence {
    /// English weekday name of the occurrence date, e.g. `"Sunday"`.
    #[must_use]
    pub fn day_name(&self) -> String {
        self.occurrence_date.format("%A").to_string()
    }
}

/// New occurrence for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = event_occurrence)]
pub struct NewEventOccurrence {
    pub event_id: uuid::Uuid,
    pub occurrence_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
}

/// Manual edits to an existing occurrence.
///
/// `None` leaves a column unchanged; the nested options clear nullable columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = event_occurrence)]
pub struct OccurrenceChangeset {
    pub occurrence_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<Option<NaiveTime>>,
    pub leader_id: Option<Option<uuid::Uuid>>,
    pub is_cancelled: Option<bool>,
    pub notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
