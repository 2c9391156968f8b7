//! Persistence for events, their materialized occurrences and MFA profiles.

pub mod db;
pub mod error;
pub mod model;
