//! TOTP second factor.

pub mod profile;
pub mod totp;
