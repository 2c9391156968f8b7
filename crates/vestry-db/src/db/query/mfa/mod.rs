//! Query composition for `user_mfa`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::connection::DbConnection;
use crate::db::schema::user_mfa;
use crate::model::mfa::{NewUserMfa, UserMfa};

/// ## Summary
/// Returns a query to find the MFA profile of a user.
#[must_use]
pub fn by_user(user_id: Uuid) -> user_mfa::BoxedQuery<'static, diesel::pg::Pg> {
    user_mfa::table
        .filter(user_mfa::user_id.eq(user_id))
        .into_boxed()
}

/// ## Summary
/// Loads the MFA profile of a user, if one exists.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn get(conn: &mut DbConnection<'_>, user_id: Uuid) -> QueryResult<Option<UserMfa>> {
    by_user(user_id)
        .select(UserMfa::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Loads the MFA profile of a user, creating an empty one on first access.
///
/// The insert ignores a conflicting row on `user_id`, so two first requests racing
/// for the same user both end up reading the single stored profile.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn get_or_create(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    username: &str,
) -> QueryResult<UserMfa> {
    diesel::insert_into(user_mfa::table)
        .values(&NewUserMfa { user_id, username })
        .on_conflict(user_mfa::user_id)
        .do_nothing()
        .execute(conn)
        .await?;

    by_user(user_id)
        .select(UserMfa::as_select())
        .first(conn)
        .await
}

/// ## Summary
/// Stores a new base32 secret for a user.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn set_secret(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    secret: &str,
    now: DateTime<Utc>,
) -> QueryResult<UserMfa> {
    diesel::update(user_mfa::table.filter(user_mfa::user_id.eq(user_id)))
        .set((user_mfa::secret.eq(secret), user_mfa::updated_at.eq(now)))
        .returning(UserMfa::as_returning())
        .get_result(conn)
        .await
}

/// ## Summary
/// Stores a secret only while the profile has none, then returns the stored profile.
///
/// Two first-time provisioning requests racing for the same user both end up with
/// the secret written by whichever update ran first.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn set_secret_if_empty(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    secret: &str,
    now: DateTime<Utc>,
) -> QueryResult<UserMfa> {
    diesel::update(
        user_mfa::table
            .filter(user_mfa::user_id.eq(user_id))
            .filter(user_mfa::secret.eq("")),
    )
    .set((user_mfa::secret.eq(secret), user_mfa::updated_at.eq(now)))
    .execute(conn)
    .await?;

    by_user(user_id)
        .select(UserMfa::as_select())
        .first(conn)
        .await
}

/// ## Summary
/// Records a successful code verification.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn touch_verified(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> QueryResult<UserMfa> {
    diesel::update(user_mfa::table.filter(user_mfa::user_id.eq(user_id)))
        .set((
            user_mfa::last_verified_at.eq(Some(now)),
            user_mfa::updated_at.eq(now),
        ))
        .returning(UserMfa::as_returning())
        .get_result(conn)
        .await
}

/// ## Summary
/// Marks the profile enrolled, keeping the first enrollment timestamp.
///
/// ## Errors
/// Returns an error if the database operation fails.
pub async fn mark_enrolled(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> QueryResult<UserMfa> {
    diesel::update(
        user_mfa::table
            .filter(user_mfa::user_id.eq(user_id))
            .filter(user_mfa::is_enrolled.eq(false)),
    )
    .set((
        user_mfa::is_enrolled.eq(true),
        user_mfa::enrolled_at.eq(Some(now)),
        user_mfa::updated_at.eq(now),
    ))
    .execute(conn)
    .await?;

    by_user(user_id)
        .select(UserMfa::as_select())
        .first(conn)
        .await
}
