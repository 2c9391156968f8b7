//! Postgres-backed integration tests.

#[macro_use]
mod helpers;

mod mfa;
mod occurrences;
