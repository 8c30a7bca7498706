//! Test utilities for the Ubidots client
//!
//! This crate provides a scripted Transport Port, a recording delay, canned
//! server responses and a parser for requests captured off the mock socket.

pub mod inspector;
pub mod mocks;
pub mod responses;

// Re-export commonly used types
pub use inspector::{LineRequest, RequestInspector};
pub use mocks::{ConnectKind, MockTransport, MockTransportHandle, RecordingDelay};
