//! Connection lifecycle over the Transport Port
//!
//! The [`ConnectionManager`] is the only component that opens or closes the
//! socket. All of its waits are bounded busy-polls driven by the injected
//! [`Delay`], so the worst case for one request is
//! `max_reconnect_attempts * reconnect_delay_ms + timeout_ms`. Every response
//! wait after a request draws from a single poll budget of `timeout_ms`.

use super::state::ConnectionState;
use super::{Delay, Transport};
use crate::protocol::codec::ByteSource;
use crate::protocol::error::{ProtocolError, Result};
use crate::protocol::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_TIMEOUT_MS, RECONNECT_DELAY_MS};
use log::{debug, trace, warn};
use std::time::Duration;

/// Timing and retry bounds for one connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPolicy {
    /// Poll budget for one whole response, one poll per millisecond
    pub timeout_ms: u32,
    /// Total connect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Pause between two connect attempts
    pub reconnect_delay_ms: u32,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: RECONNECT_DELAY_MS,
        }
    }
}

impl ConnectionPolicy {
    /// Response timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }
}

/// How the first connect attempt of a request is made
///
/// Retries after a failed first attempt are always secure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Plain connect, then secure reconnects
    Plain,
    /// Secure connect throughout
    Secure,
}

/// Owns the socket and its connection state
pub struct ConnectionManager<T, D> {
    transport: T,
    delay: D,
    policy: ConnectionPolicy,
    state: ConnectionState,
    last_attempts: u32,
    response_budget: u32,
    debug: bool,
}

impl<T: Transport, D: Delay> ConnectionManager<T, D> {
    /// Create a manager around a transport; nothing is opened yet
    pub fn new(transport: T, delay: D, policy: ConnectionPolicy) -> Self {
        Self {
            transport,
            delay,
            policy,
            state: ConnectionState::Disconnected,
            last_attempts: 0,
            response_budget: policy.timeout_ms,
            debug: false,
        }
    }

    /// Toggle verbose tracing
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retry and timeout bounds
    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    /// Connect attempts made by the last `ensure_connected` call
    pub fn last_connect_attempts(&self) -> u32 {
        self.last_attempts
    }

    /// Pass-through of the transport's connected predicate
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Make sure the socket is connected, retrying within the attempt budget
    ///
    /// Blocks for up to `max_reconnect_attempts * reconnect_delay_ms`. Returns
    /// `true` as soon as the transport reports connected. On terminal failure
    /// the socket is flushed and stopped to drop any half-open state.
    pub fn ensure_connected(&mut self, host: &str, port: u16, mode: ConnectMode) -> bool {
        self.last_attempts = 0;

        if self.transport.is_connected() {
            trace!("Socket already connected to {host}:{port}");
            self.state = ConnectionState::Connected;
            return true;
        }

        let budget = self.policy.max_reconnect_attempts;
        while self.last_attempts < budget {
            if self.last_attempts > 0 {
                self.delay.delay_ms(self.policy.reconnect_delay_ms);
            }

            let secure = self.last_attempts > 0 || mode == ConnectMode::Secure;
            if self.debug {
                debug!(
                    "Trying to connect to {host}:{port}, attempt number: {} (secure: {secure})",
                    self.last_attempts
                );
            }

            let reported = if secure {
                self.transport.connect_secure(host, port)
            } else {
                self.transport.connect(host, port)
            };
            self.last_attempts += 1;

            if reported && self.transport.is_connected() {
                if self.debug {
                    debug!("Connected to {host}:{port} after {} attempt(s)", self.last_attempts);
                }
                self.state = ConnectionState::Connected;
                return true;
            }
        }

        if self.debug {
            warn!("Could not connect to {host}:{port} after {budget} attempt(s)");
        }
        self.transport.flush();
        self.transport.stop();
        self.state = ConnectionState::Disconnected;
        false
    }

    /// Poll until at least one response byte is readable
    ///
    /// Checks `available` once per millisecond. Polls are drawn from the
    /// response budget, which `send` resets to `timeout_ms`.
    pub fn wait_for_response(&mut self) -> bool {
        let mut waited = 0;
        while self.transport.available() == 0 {
            if !self.poll_once() {
                if self.debug {
                    warn!("Timeout, could not read any response from the host");
                }
                return false;
            }
            waited += 1;
        }
        trace!("Response available after {waited} ms");
        true
    }

    /// Polls left for the current response
    pub fn remaining_response_budget(&self) -> u32 {
        self.response_budget
    }

    fn poll_once(&mut self) -> bool {
        if self.response_budget == 0 {
            return false;
        }
        self.delay.delay_ms(1);
        self.response_budget -= 1;
        true
    }

    /// Write a complete request and flush it
    pub fn send(&mut self, request: &[u8]) -> Result<()> {
        if !self.transport.is_connected() {
            self.state = ConnectionState::Disconnected;
            return Err(ProtocolError::NotConnected);
        }

        trace!("Writing {} bytes", request.len());
        self.transport.write(request)?;
        self.transport.flush();
        self.response_budget = self.policy.timeout_ms;
        Ok(())
    }

    /// Bulk-read whatever is readable, up to `limit` bytes
    pub fn capture_available(&mut self, limit: usize) -> Vec<u8> {
        let mut captured = Vec::with_capacity(limit.min(self.transport.available()));
        while captured.len() < limit && self.transport.available() > 0 {
            match self.transport.read_byte() {
                Some(byte) => captured.push(byte),
                None => break,
            }
        }
        trace!("Captured {} response bytes", captured.len());
        captured
    }

    /// Bulk-read until `limit` bytes, peer close, or `idle_ms` polls pass
    /// without a new byte
    ///
    /// Idle polls come out of the response budget, so a trickling peer
    /// cannot stretch the read past `timeout_ms`.
    pub fn capture_until_idle(&mut self, limit: usize, idle_ms: u32) -> Vec<u8> {
        let mut captured = Vec::new();
        let mut idle = 0;
        while captured.len() < limit {
            if self.transport.available() > 0 {
                match self.transport.read_byte() {
                    Some(byte) => captured.push(byte),
                    None => break,
                }
                idle = 0;
                continue;
            }
            if !self.transport.is_connected() || idle >= idle_ms || !self.poll_once() {
                break;
            }
            idle += 1;
        }
        trace!("Captured {} response bytes", captured.len());
        captured
    }

    /// Byte source that waits, within the response budget, for late bytes
    pub fn reader(&mut self) -> ResponseReader<'_, T, D> {
        ResponseReader { manager: self }
    }

    /// Flush and stop the socket; safe to call when already closed
    pub fn close(&mut self) {
        self.transport.flush();
        self.transport.stop();
        self.state = ConnectionState::Disconnected;
        self.response_budget = self.policy.timeout_ms;
    }
}

/// Streaming byte source over a connected transport
pub struct ResponseReader<'a, T, D> {
    manager: &'a mut ConnectionManager<T, D>,
}

impl<T: Transport, D: Delay> ByteSource for ResponseReader<'_, T, D> {
    fn next_byte(&mut self) -> Result<u8> {
        while self.manager.transport.available() == 0 {
            if !self.manager.transport.is_connected() {
                return Err(ProtocolError::parse(
                    "connection closed before the response was complete",
                ));
            }
            if !self.manager.poll_once() {
                if self.manager.debug {
                    warn!("Timeout while reading the response");
                }
                return Err(ProtocolError::Timeout(self.manager.policy.timeout()));
            }
        }

        self.manager
            .transport
            .read_byte()
            .ok_or_else(|| ProtocolError::parse("transport reported data but returned none"))
    }
}
