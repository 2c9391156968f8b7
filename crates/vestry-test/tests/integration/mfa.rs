#![allow(clippy::expect_used)]

use uuid::Uuid;
use vestry_core::config::MfaConfig;
use vestry_db::db::query::mfa as mfa_query;
use vestry_service::clock::{Clock, FixedClock};
use vestry_service::mfa::profile::{
    complete_enrollment, enrollment_uri, ensure_secret, rotate_secret, verify_code,
};
use vestry_service::mfa::totp::counter_at;

fn config() -> MfaConfig {
    MfaConfig {
        issuer: "Grace Chapel".to_string(),
        valid_window: 1,
    }
}

#[test_log::test(tokio::test)]
async fn secret_is_provisioned_once() {
    let db = test_db_or_skip!();
    let mut conn = db.conn().await.expect("conn");
    let clock = FixedClock::from_unix(1_700_000_000);
    let user = Uuid::new_v4();

    let first = ensure_secret(&mut conn, user, "deacon", &clock).await.expect("first");
    let again = ensure_secret(&mut conn, user, "deacon", &clock).await.expect("again");
    assert_eq!(first.to_base32(), again.to_base32());

    let uri = enrollment_uri(&mut conn, user, "deacon", &config(), &clock)
        .await
        .expect("uri");
    assert!(uri.starts_with("otpauth://totp/Grace%20Chapel%3Adeacon?secret="));
    assert!(uri.contains(&first.to_base32()));

    let rotated = rotate_secret(&mut conn, user, "deacon", &clock).await.expect("rotate");
    assert_ne!(rotated.to_base32(), first.to_base32());
}

#[test_log::test(tokio::test)]
async fn verification_records_timestamp() {
    let db = test_db_or_skip!();
    let mut conn = db.conn().await.expect("conn");
    let clock = FixedClock::from_unix(1_700_000_000);
    let user = Uuid::new_v4();

    let secret = ensure_secret(&mut conn, user, "treasurer", &clock).await.expect("secret");
    let previous_step = secret.code_for_counter(counter_at(clock.now()) - 1);

    assert!(!verify_code(&mut conn, user, "12345", &config(), &clock).await.expect("short"));
    let untouched = mfa_query::get(&mut conn, user).await.expect("get").expect("profile");
    assert_eq!(untouched.last_verified_at, None);

    assert!(verify_code(&mut conn, user, &previous_step, &config(), &clock).await.expect("verify"));
    let verified = mfa_query::get(&mut conn, user).await.expect("get").expect("profile");
    assert_eq!(verified.last_verified_at, Some(clock.now()));
    assert!(!verified.is_enrolled);
}

#[test_log::test(tokio::test)]
async fn unknown_user_is_rejected() {
    let db = test_db_or_skip!();
    let mut conn = db.conn().await.expect("conn");
    let clock = FixedClock::from_unix(1_700_000_000);

    let accepted = verify_code(&mut conn, Uuid::new_v4(), "000000", &config(), &clock)
        .await
        .expect("verify");
    assert!(!accepted);
}

#[test_log::test(tokio::test)]
async fn enrollment_keeps_first_timestamp() {
    let db = test_db_or_skip!();
    let mut conn = db.conn().await.expect("conn");
    let user = Uuid::new_v4();
    let enrolled_clock = FixedClock::from_unix(1_700_000_000);
    let later_clock = FixedClock::from_unix(1_700_086_400);

    let secret = ensure_secret(&mut conn, user, "secretary", &enrolled_clock)
        .await
        .expect("secret");

    let rejected = complete_enrollment(&mut conn, user, "abcdef", &config(), &enrolled_clock)
        .await
        .expect("reject");
    assert!(rejected.is_none());

    let code = secret.code_at(enrolled_clock.now());
    let profile = complete_enrollment(&mut conn, user, &code, &config(), &enrolled_clock)
        .await
        .expect("enroll")
        .expect("accepted");
    assert!(profile.is_enrolled);
    assert_eq!(profile.enrolled_at, Some(enrolled_clock.now()));

    let later_code = secret.code_at(later_clock.now());
    let again = complete_enrollment(&mut conn, user, &later_code, &config(), &later_clock)
        .await
        .expect("enroll again")
        .expect("accepted");
    assert_eq!(again.enrolled_at, Some(enrolled_clock.now()));
    assert_eq!(again.last_verified_at, Some(later_clock.now()));
}
