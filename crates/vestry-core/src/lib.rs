//! Shared configuration, errors and plain types for the Vestry workspace.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
