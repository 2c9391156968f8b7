//! Materialization of occurrence rows from recurrence rules.

use std::future::Future;

use chrono::NaiveDate;
use diesel_async::AsyncConnection;
use diesel_async::scoped_futures::ScopedFutureExt;
use uuid::Uuid;
use vestry_core::types::DateWindow;
use vestry_db::db::DbProvider;
use vestry_db::db::connection::DbConnection;
use vestry_db::db::query::event as event_query;
use vestry_db::db::query::event::occurrence as occurrence_query;
use vestry_db::model::event::occurrence::NewEventOccurrence;

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::events::rule::RecurrenceRule;

/// Window and mode of one generation run.
///
/// Missing bounds are resolved against the rule, see [`RecurrenceRule::resolve_window`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateRequest {
    pub range_start: Option<NaiveDate>,
    pub range_end: Option<NaiveDate>,
    /// Delete the event's rows inside the window before generating.
    pub replace_existing: bool,
}

impl GenerateRequest {
    #[must_use]
    pub const fn for_window(window: DateWindow) -> Self {
        Self {
            range_start: Some(window.start),
            range_end: Some(window.end),
            replace_existing: false,
        }
    }

    #[must_use]
    pub const fn replacing(mut self) -> Self {
        self.replace_existing = true;
        self
    }
}

/// Storage operations the expander needs.
///
/// Inserts are keyed by `(event_id, occurrence_date)` and must leave an existing row
/// untouched, including one written concurrently by another caller.
pub trait OccurrenceStore: Send {
    /// Inserts the row unless one exists for its event and date; `true` when inserted.
    fn insert_if_absent(
        &mut self,
        occurrence: &NewEventOccurrence,
    ) -> impl Future<Output = ServiceResult<bool>> + Send;

    /// Deletes the event's rows dated inside `window`, returning how many were removed.
    fn delete_in_window(
        &mut self,
        event_id: Uuid,
        window: DateWindow,
    ) -> impl Future<Output = ServiceResult<usize>> + Send;
}

impl OccurrenceStore for DbConnection<'_> {
    async fn insert_if_absent(&mut self, occurrence: &NewEventOccurrence) -> ServiceResult<bool> {
        Ok(occurrence_query::insert_if_absent(self, occurrence).await?)
    }

    async fn delete_in_window(&mut self, event_id: Uuid, window: DateWindow) -> ServiceResult<usize> {
        Ok(occurrence_query::delete_in_window(self, event_id, window).await?)
    }
}

/// ## Summary
/// Expands `rule` over the requested window and inserts the missing occurrence rows.
///
/// Non-recurring rules and windows whose end precedes their start create nothing.
/// Existing rows are never modified, so manual edits survive regeneration; only
/// `replace_existing` removes rows, and only those dated inside the window.
///
/// ## Side Effects
/// - Deletes the event's rows in the window when `replace_existing` is set
/// - Inserts one row per missing date
///
/// ## Errors
/// Returns `ServiceError::ValidationError` for a weekly or biweekly rule without a
/// weekday, or the store's error if a write fails.
#[tracing::instrument(skip(store, rule), fields(event_id = %rule.event_id))]
pub async fn generate_occurrences<S: OccurrenceStore>(
    store: &mut S,
    rule: &RecurrenceRule,
    request: GenerateRequest,
) -> ServiceResult<usize> {
    if !rule.is_recurring() {
        tracing::trace!("Event does not recur, nothing to generate");
        return Ok(0);
    }
    rule.validate()?;

    let Some(window) = rule.resolve_window(request.range_start, request.range_end) else {
        tracing::debug!("Window end precedes start, nothing to generate");
        return Ok(0);
    };

    if request.replace_existing {
        let removed = store.delete_in_window(rule.event_id, window).await?;
        tracing::debug!(removed, %window, "Cleared existing occurrences");
    }

    let mut created = 0;
    for date in rule.occurrences(window) {
        if store.insert_if_absent(&rule.new_occurrence(date)).await? {
            created += 1;
            tracing::trace!(%date, "Created occurrence");
        }
    }

    tracing::debug!(created, days = window.len_days(), %window, "Generated occurrences");
    Ok(created)
}

/// ## Summary
/// Runs [`generate_occurrences`] against the database inside one transaction.
///
/// ## Errors
/// Returns an error if validation fails or a database operation fails; the
/// transaction is rolled back in either case.
pub async fn generate_in_transaction(
    conn: &mut DbConnection<'_>,
    rule: &RecurrenceRule,
    request: GenerateRequest,
) -> ServiceResult<usize> {
    let rule = rule.clone();

    conn.transaction::<_, ServiceError, _>(move |tx| {
        async move { generate_occurrences(tx, &rule, request).await }.scope_boxed()
    })
    .await
}

/// ## Summary
/// Loads an event and generates its occurrences for the requested window.
///
/// ## Errors
/// Returns `ServiceError::NotFound` when the event does not exist, plus the errors
/// of [`generate_in_transaction`].
#[tracing::instrument(skip(conn))]
pub async fn generate_for_event(
    conn: &mut DbConnection<'_>,
    event_id: Uuid,
    request: GenerateRequest,
) -> ServiceResult<usize> {
    let event = event_query::get(conn, event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event {event_id}")))?;

    let rule = RecurrenceRule::from_event(&event)?;
    generate_in_transaction(conn, &rule, request).await
}

/// ## Summary
/// Generates occurrences of every recurring event for the calendar months starting
/// with the month of `today`.
///
/// Events whose stored rule is invalid are skipped with a warning so one bad row
/// does not block the batch.
///
/// ## Errors
/// Returns an error if listing events or writing occurrences fails.
#[tracing::instrument(skip(conn))]
pub async fn generate_upcoming(
    conn: &mut DbConnection<'_>,
    today: NaiveDate,
    horizon_months: u8,
) -> ServiceResult<usize> {
    let window = DateWindow::months_from(today, u32::from(horizon_months));
    let events = event_query::list_recurring(conn).await?;

    let mut total = 0;
    for event in &events {
        let rule = match RecurrenceRule::from_event(event).and_then(|rule| {
            rule.validate()?;
            Ok(rule)
        }) {
            Ok(rule) => rule,
            Err(error) => {
                tracing::warn!(event_id = %event.id, %error, "Skipping event with invalid recurrence");
                continue;
            }
        };

        total += generate_in_transaction(conn, &rule, GenerateRequest::for_window(window)).await?;
    }

    tracing::info!(events = events.len(), created = total, %window, "Generated upcoming occurrences");
    Ok(total)
}

/// ## Summary
/// Checks out a connection and runs [`generate_upcoming`] for the clock's current date.
///
/// ## Errors
/// Returns an error if no connection is available or generation fails.
pub async fn generate_upcoming_with<P>(
    provider: &P,
    clock: &dyn Clock,
    horizon_months: u8,
) -> ServiceResult<usize>
where
    P: DbProvider + ?Sized,
{
    let mut conn = provider.get_connection().await?;
    generate_upcoming(&mut conn, clock.today(), horizon_months).await
}
