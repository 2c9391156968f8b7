//! Month schedules and hand edits of individual occurrences.

use chrono::{Datelike, NaiveDate, NaiveTime};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;
use vestry_core::types::DateWindow;
use vestry_db::db::connection::DbConnection;
use vestry_db::db::query::event as event_query;
use vestry_db::db::query::event::occurrence as occurrence_query;
use vestry_db::model::event::Event;
use vestry_db::model::event::occurrence::{EventOccurrence, OccurrenceChangeset};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::events::generate::{GenerateRequest, generate_in_transaction};
use crate::events::rule::RecurrenceRule;

/// One event's occurrences for a calendar month.
#[derive(Debug, Clone)]
pub struct MonthSchedule {
    pub event: Event,
    pub month: DateWindow,
    /// Rows inserted while preparing the schedule.
    pub created: usize,
    pub occurrences: Vec<EventOccurrence>,
}

/// ## Summary
/// Parses a `YYYY-MM` month into its first day.
#[must_use]
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").ok()
}

/// ## Summary
/// Keeps only rows dated on the rule's weekday for weekly and biweekly rules.
///
/// Rows added by hand on other days are dropped from the schedule view; daily and
/// monthly rules keep every row.
#[must_use]
pub fn retain_on_weekday(
    rule: &RecurrenceRule,
    mut occurrences: Vec<EventOccurrence>,
) -> Vec<EventOccurrence> {
    if let (Some(pattern), Some(weekday)) = (rule.pattern, rule.weekday)
        && pattern.needs_weekday()
    {
        occurrences.retain(|occurrence| occurrence.occurrence_date.weekday() == weekday);
    }
    occurrences
}

/// ## Summary
/// Builds the schedule of one event for a month, generating missing rows first.
///
/// `month` is `YYYY-MM`; when absent or unparseable the month of the event's start
/// date is used.
///
/// ## Errors
/// Returns `ServiceError::NotFound` when the event does not exist, a validation
/// error for an invalid recurrence, or a database error.
#[tracing::instrument(skip(conn))]
pub async fn month_schedule(
    conn: &mut DbConnection<'_>,
    event_id: Uuid,
    month: Option<&str>,
) -> ServiceResult<MonthSchedule> {
    let event = event_query::get(conn, event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event {event_id}")))?;

    let first_day = month.and_then(parse_month).unwrap_or(event.start_date);
    let window = DateWindow::month_of(first_day);
    let rule = RecurrenceRule::from_event(&event)?;

    let created = if rule.is_recurring() {
        generate_in_transaction(conn, &rule, GenerateRequest::for_window(window)).await?
    } else {
        0
    };

    let rows = occurrence_query::list_in_window(conn, event_id, window).await?;
    let occurrences = retain_on_weekday(&rule, rows);

    Ok(MonthSchedule {
        event,
        month: window,
        created,
        occurrences,
    })
}

/// Hand edit of one occurrence. `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceEdit {
    pub occurrence_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<Option<NaiveTime>>,
    pub leader_id: Option<Option<Uuid>>,
    pub is_cancelled: Option<bool>,
    pub notes: Option<String>,
}

impl OccurrenceEdit {
    fn into_changeset(self, now: chrono::DateTime<chrono::Utc>) -> OccurrenceChangeset {
        OccurrenceChangeset {
            occurrence_date: self.occurrence_date,
            start_time: self.start_time,
            end_time: self.end_time,
            leader_id: self.leader_id,
            is_cancelled: self.is_cancelled,
            notes: self.notes,
            updated_at: Some(now),
        }
    }
}

fn date_taken(error: DieselError) -> ServiceError {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ServiceError::Conflict("An occurrence already exists on that date.".to_string())
        }
        other => other.into(),
    }
}

async fn rule_of(conn: &mut DbConnection<'_>, event_id: Uuid) -> ServiceResult<RecurrenceRule> {
    let event = event_query::get(conn, event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event {event_id}")))?;
    RecurrenceRule::from_event(&event)
}

/// ## Summary
/// Applies a hand edit to one occurrence.
///
/// The resulting date is checked against the event's current recurrence bounds,
/// even when the edit leaves the date unchanged.
///
/// ## Errors
/// Returns `ServiceError::NotFound` for an unknown occurrence,
/// `ServiceError::ValidationError` for a date outside the recurrence bounds, and
/// `ServiceError::Conflict` when the event already has a row on the new date.
#[tracing::instrument(skip(conn, edit, clock))]
pub async fn edit_occurrence(
    conn: &mut DbConnection<'_>,
    occurrence_id: Uuid,
    edit: OccurrenceEdit,
    clock: &dyn Clock,
) -> ServiceResult<EventOccurrence> {
    let existing = occurrence_query::get(conn, occurrence_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("occurrence {occurrence_id}")))?;

    let date = edit.occurrence_date.unwrap_or(existing.occurrence_date);
    rule_of(conn, existing.event_id)
        .await?
        .validate_manual_date(date)?;

    occurrence_query::update(conn, occurrence_id, &edit.into_changeset(clock.now()))
        .await
        .map_err(date_taken)
}

/// ## Summary
/// Adds an occurrence by hand, using the event's anchor times.
///
/// ## Errors
/// Returns `ServiceError::ValidationError` when the date is outside the recurrence
/// bounds and `ServiceError::Conflict` when a row already exists on that date.
#[tracing::instrument(skip(conn))]
pub async fn add_manual_occurrence(
    conn: &mut DbConnection<'_>,
    event_id: Uuid,
    date: NaiveDate,
) -> ServiceResult<EventOccurrence> {
    let rule = rule_of(conn, event_id).await?;
    rule.validate_manual_date(date)?;

    if !occurrence_query::insert_if_absent(conn, &rule.new_occurrence(date)).await? {
        return Err(ServiceError::Conflict(
            "An occurrence already exists on that date.".to_string(),
        ));
    }

    occurrence_query::get_by_date(conn, event_id, date)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("occurrence of {event_id} on {date}")))
}
