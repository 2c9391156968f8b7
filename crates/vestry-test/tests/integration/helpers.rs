#![allow(clippy::expect_used, dead_code)]
//! Test helpers for Postgres-backed integration tests.
//!
//! Tests run only when `VESTRY_TEST_DATABASE_URL` points at a scratch database;
//! otherwise [`TestDb::from_env`] returns `None` and the test returns early.
//!
//! ## Database Isolation
//! A process-wide lock serializes the tests. Each `TestDb` applies pending
//! migrations and truncates every table before handing out connections.

use chrono::{NaiveDate, NaiveTime};
use diesel_async::RunQueryDsl;
use tokio::sync::{Mutex, MutexGuard};
use vestry_db::db::connection::{DbConnection, DbPool, create_pool};
use vestry_db::db::migrations::run_migrations;
use vestry_db::db::query::event as event_query;
use vestry_db::model::event::{Event, NewEvent, RecurrencePattern};

pub use tracing;

const DATABASE_URL_VAR: &str = "VESTRY_TEST_DATABASE_URL";

static DB_LOCK: Mutex<()> = Mutex::const_new(());

/// Exclusive handle on the scratch database.
pub struct TestDb {
    pool: DbPool,
    _guard: MutexGuard<'static, ()>,
}

impl TestDb {
    /// Connects to the scratch database, or returns `None` when none is configured.
    ///
    /// ## Errors
    /// Returns an error if migrations, pool creation or truncation fail.
    pub async fn from_env() -> anyhow::Result<Option<Self>> {
        let Ok(url) = std::env::var(DATABASE_URL_VAR) else {
            tracing::warn!("{DATABASE_URL_VAR} not set, skipping database test");
            return Ok(None);
        };

        let guard = DB_LOCK.lock().await;
        run_migrations(&url).await?;
        let pool = create_pool(&url, 2).await?;

        let db = Self {
            pool,
            _guard: guard,
        };
        db.truncate().await?;
        Ok(Some(db))
    }

    async fn truncate(&self) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("TRUNCATE TABLE event_occurrence, event, user_mfa CASCADE")
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// ## Errors
    /// Returns an error if no connection is available.
    pub async fn conn(&self) -> anyhow::Result<DbConnection<'_>> {
        Ok(self.pool.get().await?)
    }

    /// Inserts a recurring event starting at 10:00.
    ///
    /// ## Errors
    /// Returns an error if the insert fails.
    pub async fn recurring_event(
        &self,
        title: &str,
        pattern: RecurrencePattern,
        weekday: Option<i16>,
        start_date: NaiveDate,
        recurrence_until: Option<NaiveDate>,
    ) -> anyhow::Result<Event> {
        let mut conn = self.conn().await?;
        let new_event = NewEvent {
            title,
            description: "",
            location: "Sanctuary",
            start_date,
            end_date: None,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(11, 30, 0),
            is_recurring: true,
            recurrence_pattern: Some(pattern),
            recurrence_weekday: weekday,
            recurrence_until,
        };
        Ok(event_query::insert(&mut conn, &new_event).await?)
    }
}

/// Opens the scratch database or returns from the calling test.
macro_rules! test_db_or_skip {
    () => {{
        let Some(db) = $crate::helpers::TestDb::from_env()
            .await
            .expect("test database setup")
        else {
            return;
        };
        db
    }};
}
