//! Protocol-specific error types
//!
//! Every failure a request can hit maps onto one of four kinds: the socket
//! never connected, the server never answered, the answer did not match the
//! expected grammar, or the answer itself reported an application error.
//! The public facade collapses all of them into `false` / [`ERROR_VALUE`].
//!
//! [`ERROR_VALUE`]: crate::protocol::ERROR_VALUE

use std::time::Duration;
use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol-specific error types
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Socket never reached the connected state within the attempt budget
    #[error("Could not connect to {host}:{port} after {attempts} attempt(s)")]
    ConnectFailure {
        host: String,
        port: u16,
        attempts: u32,
    },

    /// No bytes arrived within the response timeout
    #[error("No response from server within {0:?}")]
    Timeout(Duration),

    /// Response bytes do not match the expected grammar
    #[error("Malformed response: {message}")]
    Parse { message: String },

    /// Response content reports an application-level failure
    #[error("Server error (status {status:?}): {message}")]
    ServerError { status: Option<u16>, message: String },

    /// Operation requires an open socket
    #[error("Not connected to server")]
    NotConnected,

    /// Request could not be built
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// Value does not fit the fixed decimal buffer
    #[error("Value of {size} bytes exceeds buffer capacity of {capacity}")]
    BufferOverflow { size: usize, capacity: usize },
}

impl ProtocolError {
    /// Create a connect failure error
    pub fn connect_failure(host: impl Into<String>, port: u16, attempts: u32) -> Self {
        Self::ConnectFailure {
            host: host.into(),
            port,
            attempts,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a server error
    pub fn server_error(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a buffer overflow error
    pub fn buffer_overflow(size: usize, capacity: usize) -> Self {
        Self::BufferOverflow { size, capacity }
    }

    /// Check if this error is transient and the call can be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ConnectFailure { .. } | Self::Timeout(_) | Self::NotConnected
        )
    }

    /// Check if the server answered but rejected the request
    pub fn is_server_side(&self) -> bool {
        matches!(self, Self::ServerError { .. })
    }

    /// Check if the answer arrived but could not be understood
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::BufferOverflow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failure_display() {
        let error = ProtocolError::connect_failure("industrial.api.ubidots.com", 9812, 5);
        let message = error.to_string();
        assert!(message.contains("industrial.api.ubidots.com:9812"));
        assert!(message.contains("5 attempt"));
        assert!(error.is_transient());
        assert!(!error.is_server_side());
    }

    #[test]
    fn test_timeout_is_transient() {
        let error = ProtocolError::Timeout(Duration::from_millis(5000));
        assert!(error.is_transient());
        assert!(error.to_string().contains("5s"));
    }

    #[test]
    fn test_parse_and_overflow_are_parse_failures() {
        assert!(ProtocolError::parse("missing delimiter").is_parse_failure());
        assert!(ProtocolError::buffer_overflow(40, 32).is_parse_failure());
        assert!(!ProtocolError::NotConnected.is_parse_failure());
    }

    #[test]
    fn test_server_error() {
        let error = ProtocolError::server_error(Some(400), "Bad Request");
        assert!(error.is_server_side());
        assert!(!error.is_transient());
        assert!(error.to_string().contains("400"));
        assert!(error.to_string().contains("Bad Request"));
    }

    #[test]
    fn test_buffer_overflow_display() {
        let error = ProtocolError::buffer_overflow(40, 32);
        assert!(error.to_string().contains("40"));
        assert!(error.to_string().contains("32"));
    }
}
