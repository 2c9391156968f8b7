pub mod event;
pub mod mfa;
