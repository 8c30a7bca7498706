//! Ubidots Client Core Library
//!
//! Wire-protocol client for memory-constrained telemetry devices. It builds
//! exactly-sized requests for the HTTP and line-protocol endpoints, sends them
//! over a single socket and parses the streamed answer into a numeric value
//! without buffering the full response.

pub mod error;
pub mod protocol;
pub mod security;

// Re-export main types
pub use error::{Error, Result};
pub use protocol::transport::{
    ConnectMode, ConnectionManager, ConnectionPolicy, ConnectionState, Delay, RequestPhase,
    StdDelay, TcpTransport, Transport, TransportStats,
};
pub use protocol::{
    ERROR_VALUE, ProtocolClient, ProtocolConfig, ProtocolError, TelemetryClient, WireFormat,
    is_error_value,
};
pub use security::AuthToken;
