use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::{pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};

use crate::db::schema;

pub mod occurrence;

// Re-export RecurrencePattern for public API
pub use crate::db::enums::RecurrencePattern;

/// Scheduled church event, carrying its own recurrence rule.
#[derive(
    Debug, Clone, PartialEq, Eq, Identifiable, Queryable, Selectable, Serialize, Deserialize,
)]
#[diesel(table_name = schema::event)]
#[diesel(check_for_backend(Pg))]
pub struct Event {
    pub id: uuid::Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// 0 = Monday through 6 = Sunday.
    pub recurrence_weekday: Option<i16>,
    /// Hard ceiling for generated occurrence dates.
    pub recurrence_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::event)]
pub struct NewEvent<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_weekday: Option<i16>,
    pub recurrence_until: Option<NaiveDate>,
}
