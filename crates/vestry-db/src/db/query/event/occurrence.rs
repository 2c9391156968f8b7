//! Query composition for `event_occurrence`.

use chrono::NaiveDate;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{QueryFragment, QueryId};
use diesel_async::RunQueryDsl;
use uuid::Uuid;
use vestry_core::types::DateWindow;

use crate::db::connection::DbConnection;
use crate::db::schema::event_occurrence;
use crate::model::event::occurrence::{EventOccurrence, NewEventOccurrence, OccurrenceChangeset};

/// ## Summary
/// Returns a query to select all occurrences of an event, ordered by date.
#[must_use]
pub fn by_event(event_id: Uuid) -> event_occurrence::BoxedQuery<'static, Pg> {
    event_occurrence::table
        .filter(event_occurrence::event_id.eq(event_id))
        .order((
            event_occurrence::occurrence_date.asc(),
            event_occurrence::start_time.asc(),
        ))
        .into_boxed()
}

/// ## Summary
/// Returns a query to select an event's occurrences whose date lies in `window`.
#[must_use]
pub fn by_event_in_window(
    event_id: Uuid,
    window: DateWindow,
) -> event_occurrence::BoxedQuery<'static, Pg> {
    by_event(event_id)
        .filter(event_occurrence::occurrence_date.ge(window.start))
        .filter(event_occurrence::occurrence_date.le(window.end))
}

/// ## Summary
/// Returns the insert statement used by [`insert_if_absent`].
///
/// The statement does nothing when a row already exists for the same
/// `(event_id, occurrence_date)` key.
#[must_use]
pub fn insert_if_absent_query(
    occurrence: &NewEventOccurrence,
) -> impl QueryFragment<Pg> + QueryId + Send + '_ {
    diesel::insert_into(event_occurrence::table)
        .values(occurrence)
        .on_conflict((
            event_occurrence::event_id,
            event_occurrence::occurrence_date,
        ))
        .do_nothing()
}

/// ## Summary
/// Inserts an occurrence unless one already exists for the same event and date.
///
/// Uses `ON CONFLICT DO NOTHING` on the `(event_id, occurrence_date)` key, so a
/// concurrent writer that wins the race is treated as "already exists" and the
/// existing row is never touched.
///
/// Returns `true` when a row was inserted.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn insert_if_absent(
    conn: &mut DbConnection<'_>,
    occurrence: &NewEventOccurrence,
) -> QueryResult<bool> {
    let inserted = insert_if_absent_query(occurrence).execute(conn).await?;
    Ok(inserted == 1)
}

/// ## Summary
/// Deletes an event's occurrences whose date lies in `window`.
///
/// Returns the number of deleted rows.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn delete_in_window(
    conn: &mut DbConnection<'_>,
    event_id: Uuid,
    window: DateWindow,
) -> QueryResult<usize> {
    diesel::delete(
        event_occurrence::table
            .filter(event_occurrence::event_id.eq(event_id))
            .filter(event_occurrence::occurrence_date.ge(window.start))
            .filter(event_occurrence::occurrence_date.le(window.end)),
    )
    .execute(conn)
    .await
}

/// ## Summary
/// Loads an event's occurrences in `window`, ordered by date.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn list_in_window(
    conn: &mut DbConnection<'_>,
    event_id: Uuid,
    window: DateWindow,
) -> QueryResult<Vec<EventOccurrence>> {
    by_event_in_window(event_id, window)
        .select(EventOccurrence::as_select())
        .load(conn)
        .await
}

/// ## Summary
/// Loads a single occurrence by ID.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn get(conn: &mut DbConnection<'_>, id: Uuid) -> QueryResult<Option<EventOccurrence>> {
    event_occurrence::table
        .filter(event_occurrence::id.eq(id))
        .select(EventOccurrence::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Loads the occurrence of an event on a given date.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn get_by_date(
    conn: &mut DbConnection<'_>,
    event_id: Uuid,
    date: NaiveDate,
) -> QueryResult<Option<EventOccurrence>> {
    by_event(event_id)
        .filter(event_occurrence::occurrence_date.eq(date))
        .select(EventOccurrence::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Applies manual edits to an occurrence and returns the updated row.
///
/// ## Errors
/// Returns an error if the database operation fails, including a unique violation
/// when the new date collides with another occurrence of the same event.
pub async fn update(
    conn: &mut DbConnection<'_>,
    id: Uuid,
    changes: &OccurrenceChangeset,
) -> QueryResult<EventOccurrence> {
    diesel::update(event_occurrence::table.filter(event_occurrence::id.eq(id)))
        .set(changes)
        .returning(EventOccurrence::as_returning())
        .get_result(conn)
        .await
}
