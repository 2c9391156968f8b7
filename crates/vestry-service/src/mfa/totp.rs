//! Time-based one-time passwords (RFC 6238, HMAC-SHA1, 30 s step, 6 digits).

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use vestry_core::constants::{TOTP_DIGITS, TOTP_SECRET_BYTES, TOTP_STEP_SECONDS};

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};

type HmacSha1 = Hmac<Sha1>;

const CODE_MODULUS: u32 = 1_000_000;

/// Shared TOTP key of one user.
///
/// Holds the HMAC already keyed with the secret; every code clones it and feeds the
/// counter. `Debug` never prints key material.
#[derive(Clone)]
pub struct TotpSecret {
    bytes: Vec<u8>,
    mac: HmacSha1,
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TotpSecret")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

impl TotpSecret {
    /// ## Summary
    /// Builds a secret from raw key bytes.
    ///
    /// ## Errors
    /// Returns `ServiceError::InvalidConfiguration` for an empty key.
    pub fn from_bytes(bytes: &[u8]) -> ServiceResult<Self> {
        if bytes.is_empty() {
            return Err(ServiceError::InvalidConfiguration(
                "TOTP secret is empty".to_string(),
            ));
        }
        let mac = HmacSha1::new_from_slice(bytes).map_err(|_| {
            ServiceError::InvalidConfiguration("TOTP secret has an invalid length".to_string())
        })?;
        Ok(Self {
            bytes: bytes.to_vec(),
            mac,
        })
    }

    /// ## Summary
    /// Generates a fresh random secret from the operating system RNG.
    ///
    /// ## Errors
    /// Never fails in practice; the key is always non-empty.
    pub fn generate() -> ServiceResult<Self> {
        let mut bytes = [0u8; TOTP_SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(&bytes)
    }

    /// ## Summary
    /// Decodes a stored base32 secret. Case and trailing `=` padding are ignored.
    ///
    /// ## Errors
    /// Returns `ServiceError::InvalidConfiguration` when the text is not base32 or
    /// decodes to nothing.
    pub fn from_base32(encoded: &str) -> ServiceResult<Self> {
        let normalized = encoded.trim().trim_end_matches('=').to_ascii_uppercase();
        let bytes = BASE32_NOPAD.decode(normalized.as_bytes()).map_err(|_| {
            ServiceError::InvalidConfiguration("TOTP secret is not valid base32".to_string())
        })?;
        Self::from_bytes(&bytes)
    }

    /// Unpadded upper-case base32, as stored and as shown to authenticator apps.
    #[must_use]
    pub fn to_base32(&self) -> String {
        BASE32_NOPAD.encode(&self.bytes)
    }

    /// ## Summary
    /// Computes the 6-digit code for a step counter.
    ///
    /// HMAC-SHA1 over the big-endian counter, dynamic truncation at the offset given by
    /// the low nibble of the last digest byte, top bit masked, reduced mod 10^6 and
    /// zero-padded.
    #[must_use]
    pub fn code_for_counter(&self, counter: u64) -> String {
        let mut mac = self.mac.clone();
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = usize::from(digest[digest.len() - 1] & 0x0f);
        let binary = u32::from_be_bytes([
            digest[offset],
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]) & 0x7fff_ffff;

        format!("{:0width$}", binary % CODE_MODULUS, width = TOTP_DIGITS)
    }

    #[must_use]
    pub fn code_at(&self, now: DateTime<Utc>) -> String {
        self.code_for_counter(counter_at(now))
    }

    /// ## Summary
    /// Checks a submitted code against the steps `counter - window ..= counter + window`
    /// around `now`.
    ///
    /// Surrounding whitespace is ignored. Anything other than six ASCII digits is
    /// rejected before any HMAC is computed. A code stays valid for its whole window,
    /// there is no replay tracking here.
    #[must_use]
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>, window: u8) -> bool {
        let token = token.trim();
        let Some(counters) = candidate_counters(token, counter_at(now), window) else {
            return false;
        };
        counters
            .into_iter()
            .any(|counter| bool::from(self.code_for_counter(counter).as_bytes().ct_eq(token.as_bytes())))
    }

    #[must_use]
    pub fn verify(&self, token: &str, clock: &dyn Clock, window: u8) -> bool {
        self.verify_at(token, clock.now(), window)
    }
}

/// Step counter of `now`; instants before the epoch map to step 0.
#[must_use]
pub fn counter_at(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp().div_euclid(TOTP_STEP_SECONDS)).unwrap_or(0)
}

/// Exactly six ASCII digits.
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOTP_DIGITS && token.bytes().all(|b| b.is_ascii_digit())
}

/// ## Summary
/// Returns the step counters a token is checked against, or `None` when the token is
/// malformed and must be rejected without computing anything.
#[must_use]
pub fn candidate_counters(token: &str, counter: u64, window: u8) -> Option<RangeInclusive<u64>> {
    let window = u64::from(window);
    is_well_formed(token)
        .then(|| counter.saturating_sub(window)..=counter.saturating_add(window))
}
