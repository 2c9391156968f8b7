pub mod clock;
pub mod error;
pub mod events;
pub mod mfa;
