//! Recurring events: rule enumeration, occurrence generation and schedules.

pub mod generate;
pub mod rule;
pub mod schedule;
