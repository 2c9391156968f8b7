/// Issuer label used when none is configured.
pub const DEFAULT_MFA_ISSUER: &str = "Church Management";

/// Time step of one TOTP counter, in seconds.
pub const TOTP_STEP_SECONDS: i64 = 30;

/// Digits in a TOTP code.
pub const TOTP_DIGITS: usize = 6;

/// Steps of clock skew tolerated on either side of the current counter.
pub const DEFAULT_TOTP_WINDOW: u8 = 1;

/// Widest accepted skew window; ten steps is five minutes either way.
pub const MAX_TOTP_WINDOW: u8 = 10;

/// Raw bytes in a freshly generated TOTP secret.
pub const TOTP_SECRET_BYTES: usize = 20;

/// Calendar months materialized by the upcoming-occurrences batch.
pub const DEFAULT_HORIZON_MONTHS: u8 = 3;
