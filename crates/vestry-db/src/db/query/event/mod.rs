//! Query composition for `event`.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::connection::DbConnection;
use crate::db::schema::event;
use crate::model::event::{Event, NewEvent};

pub mod occurrence;

/// ## Summary
/// Returns a query to select all events.
#[must_use]
pub fn all() -> event::BoxedQuery<'static, diesel::pg::Pg> {
    event::table.into_boxed()
}

/// ## Summary
/// Returns a query to find an event by ID.
#[must_use]
pub fn by_id(id: Uuid) -> event::BoxedQuery<'static, diesel::pg::Pg> {
    all().filter(event::id.eq(id))
}

/// ## Summary
/// Returns a query to find events flagged as recurring.
#[must_use]
pub fn recurring() -> event::BoxedQuery<'static, diesel::pg::Pg> {
    all()
        .filter(event::is_recurring.eq(true))
        .filter(event::recurrence_pattern.is_not_null())
        .order(event::start_date.asc())
}

/// ## Summary
/// Inserts an event and returns the stored row.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn insert(conn: &mut DbConnection<'_>, new_event: &NewEvent<'_>) -> QueryResult<Event> {
    diesel::insert_into(event::table)
        .values(new_event)
        .returning(Event::as_returning())
        .get_result(conn)
        .await
}

/// ## Summary
/// Loads an event by ID.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn get(conn: &mut DbConnection<'_>, id: Uuid) -> QueryResult<Option<Event>> {
    by_id(id)
        .select(Event::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Loads every recurring event, oldest first.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn list_recurring(conn: &mut DbConnection<'_>) -> QueryResult<Vec<Event>> {
    recurring().select(Event::as_select()).load(conn).await
}

/// ## Summary
/// Deletes an event; its occurrences go with it through the cascading foreign key.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn delete(conn: &mut DbConnection<'_>, id: Uuid) -> QueryResult<bool> {
    let deleted = diesel::delete(event::table.filter(event::id.eq(id)))
        .execute(conn)
        .await?;
    Ok(deleted > 0)
}
