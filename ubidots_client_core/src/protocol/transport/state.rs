//! Connection and request lifecycle state
//!
//! [`ConnectionState`] is what the outside world can observe about the socket.
//! [`RequestPhase`] tracks a single `get`/`send_data` call from start to the
//! unconditional close at the end.

use std::fmt;

/// Observable state of the device socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No open socket
    #[default]
    Disconnected,
    /// Socket reports connected
    Connected,
}

impl ConnectionState {
    /// Check if requests can be written
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Phase of one request, from `Idle` to `Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPhase {
    /// No request started yet
    #[default]
    Idle,
    /// Connect attempts in progress
    Connecting,
    /// Socket open, request not yet written
    Connected,
    /// Attempt budget exhausted
    Failed,
    /// Request being written
    Sending,
    /// Polling for the first response byte
    Waiting,
    /// Consuming the response
    Parsing,
    /// Socket released
    Closed,
}

impl RequestPhase {
    /// Check if the request has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestPhase::Closed)
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestPhase::Idle => "Idle",
            RequestPhase::Connecting => "Connecting",
            RequestPhase::Connected => "Connected",
            RequestPhase::Failed => "Failed",
            RequestPhase::Sending => "Sending",
            RequestPhase::Waiting => "Waiting",
            RequestPhase::Parsing => "Parsing",
            RequestPhase::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Phase transition validator
pub struct PhaseTransition {
    from: RequestPhase,
    to: RequestPhase,
}

impl PhaseTransition {
    /// Create a new phase transition
    pub fn new(from: RequestPhase, to: RequestPhase) -> Self {
        Self { from, to }
    }

    /// Check if the transition is allowed by the request state machine
    pub fn is_valid(&self) -> bool {
        use RequestPhase::*;

        match (self.from, self.to) {
            (Idle, Connecting) => true,

            (Connecting, Connected) => true,
            (Connecting, Failed) => true,

            // Failed short-circuits straight to Closed
            (Failed, Closed) => true,

            (Connected, Sending) => true,
            (Connected, Closed) => true,

            (Sending, Waiting) => true,
            (Sending, Closed) => true,

            (Waiting, Parsing) => true,
            (Waiting, Closed) => true,

            (Parsing, Closed) => true,

            // Next request
            (Closed, Idle) => true,

            _ => false,
        }
    }

    /// Get a description of why a transition is invalid
    pub fn validation_error(&self) -> Option<String> {
        if self.is_valid() {
            None
        } else {
            Some(format!(
                "Invalid transition from {} to {}",
                self.from, self.to
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_capabilities() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_successful_request_path_is_valid() {
        use RequestPhase::*;

        let path = [
            Idle, Connecting, Connected, Sending, Waiting, Parsing, Closed, Idle,
        ];
        for pair in path.windows(2) {
            let transition = PhaseTransition::new(pair[0], pair[1]);
            assert!(
                transition.is_valid(),
                "Transition from {:?} to {:?} should be valid",
                pair[0],
                pair[1]
            );
            assert_eq!(transition.validation_error(), None);
        }
    }

    #[test]
    fn test_failure_paths_reach_closed() {
        use RequestPhase::*;

        for from in [Failed, Connected, Sending, Waiting, Parsing] {
            assert!(PhaseTransition::new(from, Closed).is_valid());
        }
    }

    #[test]
    fn test_invalid_transitions() {
        use RequestPhase::*;

        let invalid = vec![
            (Idle, Sending),
            (Failed, Sending),
            (Connecting, Parsing),
            (Waiting, Sending),
            (Closed, Connecting),
            (Idle, Closed),
        ];

        for (from, to) in invalid {
            let transition = PhaseTransition::new(from, to);
            assert!(
                !transition.is_valid(),
                "Transition from {from:?} to {to:?} should be invalid"
            );
            assert!(transition.validation_error().is_some());
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RequestPhase::Waiting.to_string(), "Waiting");
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert!(RequestPhase::Closed.is_terminal());
        assert!(!RequestPhase::Failed.is_terminal());
    }
}
