//! Credential handling
//!
//! The device token authenticates every request. It is kept in an
//! [`AuthToken`] so it never reaches a log record by accident.

pub mod auth_token;

pub use auth_token::AuthToken;
