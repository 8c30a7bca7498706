//! Transport layer for the single device socket
//!
//! The socket itself (plain or TLS) is supplied by the platform through the
//! [`Transport`] port. This module adds connection lifecycle management on top
//! of it, the request phase state machine, and a std `TcpStream` adapter.

mod connection;
mod socket;
mod state;

pub use connection::{ConnectMode, ConnectionManager, ConnectionPolicy, ResponseReader};
pub use socket::{TcpTransport, TransportStats};
pub use state::{ConnectionState, PhaseTransition, RequestPhase};

use std::io;
use std::time::Duration;

/// Byte-oriented socket supplied by the platform
///
/// Implementations never block on reads: `available` reports how many bytes
/// can be taken right now and `read_byte` returns `None` when there are none.
pub trait Transport {
    /// Open a plain connection
    fn connect(&mut self, host: &str, port: u16) -> bool;

    /// Open a TLS connection
    fn connect_secure(&mut self, host: &str, port: u16) -> bool;

    /// Whether the socket is open, or closed with unread bytes still buffered
    fn is_connected(&self) -> bool;

    /// Number of bytes readable without blocking
    fn available(&mut self) -> usize;

    /// Take one byte, `None` when nothing is readable
    fn read_byte(&mut self) -> Option<u8>;

    /// Read readable bytes up to (not including) `delimiter`
    ///
    /// Stops early, without the delimiter, when no more bytes are readable.
    fn read_line(&mut self, delimiter: u8) -> Vec<u8> {
        let mut line = Vec::new();
        while self.available() > 0 {
            match self.read_byte() {
                Some(byte) if byte == delimiter => break,
                Some(byte) => line.push(byte),
                None => break,
            }
        }
        line
    }

    /// Write all bytes to the socket
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Push buffered output to the wire
    fn flush(&mut self);

    /// Close the socket and discard unread input
    fn stop(&mut self);
}

/// Blocking pause capability used by every bounded wait
pub trait Delay {
    /// Block the caller for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);
}

/// [`Delay`] backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
