//! Per-user MFA enrollment and verification.

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use uuid::Uuid;
use vestry_core::config::MfaConfig;
use vestry_db::db::connection::DbConnection;
use vestry_db::db::query::mfa as mfa_query;
use vestry_db::model::mfa::UserMfa;

use crate::clock::Clock;
use crate::error::ServiceResult;
use crate::mfa::totp::TotpSecret;

/// Characters left as-is in URI components; everything else is percent-encoded.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// ## Summary
/// Builds the `otpauth://totp/...` URI that authenticator apps enroll from.
#[must_use]
pub fn provisioning_uri(issuer: &str, username: &str, secret: &TotpSecret) -> String {
    let label = format!("{issuer}:{username}");
    format!(
        "otpauth://totp/{}?secret={}&issuer={}",
        utf8_percent_encode(&label, URI_COMPONENT),
        secret.to_base32(),
        utf8_percent_encode(issuer, URI_COMPONENT),
    )
}

/// ## Summary
/// Checks a code against a stored profile at `now`.
///
/// A profile without a secret rejects every code.
///
/// ## Errors
/// Returns `ServiceError::InvalidConfiguration` when the stored secret is not base32.
pub fn check_code(
    profile: &UserMfa,
    token: &str,
    now: DateTime<Utc>,
    window: u8,
) -> ServiceResult<bool> {
    if !profile.has_secret() {
        return Ok(false);
    }
    let secret = TotpSecret::from_base32(&profile.secret)?;
    Ok(secret.verify_at(token, now, window))
}

/// ## Summary
/// Returns the user's secret, generating and storing one on first use.
///
/// ## Errors
/// Returns an error if the stored secret is corrupt or a database operation fails.
#[tracing::instrument(skip(conn, clock))]
pub async fn ensure_secret(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    username: &str,
    clock: &dyn Clock,
) -> ServiceResult<TotpSecret> {
    let profile = mfa_query::get_or_create(conn, user_id, username).await?;
    if profile.has_secret() {
        return TotpSecret::from_base32(&profile.secret);
    }

    let candidate = TotpSecret::generate()?;
    let stored =
        mfa_query::set_secret_if_empty(conn, user_id, &candidate.to_base32(), clock.now()).await?;
    tracing::info!("Provisioned MFA secret");
    TotpSecret::from_base32(&stored.secret)
}

/// ## Summary
/// Replaces the user's secret with a fresh random one.
///
/// Codes from the previous secret stop working immediately.
///
/// ## Errors
/// Returns an error if a database operation fails.
#[tracing::instrument(skip(conn, clock))]
pub async fn rotate_secret(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    username: &str,
    clock: &dyn Clock,
) -> ServiceResult<TotpSecret> {
    mfa_query::get_or_create(conn, user_id, username).await?;
    let secret = TotpSecret::generate()?;
    mfa_query::set_secret(conn, user_id, &secret.to_base32(), clock.now()).await?;
    tracing::info!("Rotated MFA secret");
    Ok(secret)
}

/// ## Summary
/// Returns the provisioning URI of a user, provisioning a secret first if needed.
///
/// ## Errors
/// Returns an error if the secret cannot be loaded or created.
pub async fn enrollment_uri(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    username: &str,
    config: &MfaConfig,
    clock: &dyn Clock,
) -> ServiceResult<String> {
    let secret = ensure_secret(conn, user_id, username, clock).await?;
    Ok(provisioning_uri(&config.issuer, username, &secret))
}

/// ## Summary
/// Verifies a submitted code and records the verification time on success.
///
/// Unknown users, users without a secret, malformed codes and wrong codes all
/// yield `Ok(false)`.
///
/// ## Errors
/// Returns an error if the stored secret is corrupt or a database operation fails.
#[tracing::instrument(skip(conn, token, config, clock))]
pub async fn verify_code(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    token: &str,
    config: &MfaConfig,
    clock: &dyn Clock,
) -> ServiceResult<bool> {
    let Some(profile) = mfa_query::get(conn, user_id).await? else {
        tracing::debug!("No MFA profile");
        return Ok(false);
    };

    let now = clock.now();
    if !check_code(&profile, token, now, config.valid_window)? {
        tracing::debug!("MFA code rejected");
        return Ok(false);
    }

    mfa_query::touch_verified(conn, user_id, now).await?;
    tracing::debug!("MFA code accepted");
    Ok(true)
}

/// ## Summary
/// Finishes enrollment with the first valid code.
///
/// Returns the updated profile, or `None` when the code is rejected. Enrolling again
/// keeps the original `enrolled_at`.
///
/// ## Errors
/// Returns an error if the stored secret is corrupt or a database operation fails.
#[tracing::instrument(skip(conn, token, config, clock))]
pub async fn complete_enrollment(
    conn: &mut DbConnection<'_>,
    user_id: Uuid,
    token: &str,
    config: &MfaConfig,
    clock: &dyn Clock,
) -> ServiceResult<Option<UserMfa>> {
    if !verify_code(conn, user_id, token, config, clock).await? {
        return Ok(None);
    }
    let profile = mfa_query::mark_enrolled(conn, user_id, clock.now()).await?;
    tracing::info!("MFA enrollment completed");
    Ok(Some(profile))
}
