//! Error types for the Ubidots Client Core Library
//!
//! Protocol failures live in [`crate::protocol::error`]; this module wraps
//! them together with configuration validation errors.

use thiserror::Error;

pub mod validation;

pub use self::validation::ValidationError;
pub use crate::protocol::error::ProtocolError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Ubidots Client Core Library
#[derive(Error, Debug)]
pub enum Error {
    /// Wire protocol and transport errors
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Protocol(ProtocolError::Io(source))
    }
}

impl Error {
    /// Check if retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Protocol(err) => err.is_transient(),
            Self::Validation(_) => false,
        }
    }
}
