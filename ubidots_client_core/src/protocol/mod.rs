//! Ubidots wire protocol implementation
//!
//! This module implements the device side of the Ubidots telemetry API:
//! - `transport`: Transport Port, connection lifecycle and the std socket adapter
//! - `codec`: exact-size request building and byte-at-a-time response parsing
//! - `client`: protocol client facade over the HTTP and line-protocol formats

pub mod client;
pub mod codec;
pub mod error;
mod http;
mod line;
pub mod transport;

// Re-export main types
pub use client::{ProtocolClient, ProtocolConfig, TelemetryClient, WireFormat};
pub use error::{ProtocolError, Result};
pub use transport::{ConnectionState, RequestPhase, Transport};

/// Sentinel returned by `get` on any failure path
///
/// Parsed values are required to be finite, so this can never collide with a
/// real reading.
pub const ERROR_VALUE: f64 = f64::NEG_INFINITY;

/// Default Ubidots industrial endpoint
pub const DEFAULT_SERVER: &str = "industrial.api.ubidots.com";

/// HTTPS port
pub const DEFAULT_HTTP_PORT: u16 = 443;

/// Plain HTTP port
pub const PLAINTEXT_HTTP_PORT: u16 = 80;

/// TLS line-protocol port
pub const DEFAULT_LINE_PORT: u16 = 9812;

/// Plain TCP line-protocol port
pub const PLAINTEXT_LINE_PORT: u16 = 9012;

/// Response timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u32 = 5000;

/// Connect attempts per request
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Pause between connect attempts in milliseconds
pub const RECONNECT_DELAY_MS: u32 = 1000;

/// Prefix of every device endpoint path
pub const API_DEVICES_PATH: &str = "/api/v1.6/devices/";

/// Identity tag sent as `User-Agent` and as the first line-protocol field
pub const DEFAULT_USER_AGENT: &str = concat!("RustUbidots/v", env!("CARGO_PKG_VERSION"));

/// Check whether a value returned by `get` is the failure sentinel
pub fn is_error_value(value: f64) -> bool {
    value == ERROR_VALUE
}

/// Emit a `debug!` record only when the client's debug flag is set
macro_rules! debug_trace {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            log::debug!($($arg)+);
        }
    };
}

pub(crate) use debug_trace;
