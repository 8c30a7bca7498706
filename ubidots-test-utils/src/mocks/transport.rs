//! Scripted Transport Port
//!
//! Connect outcomes are taken from a script. Replies are queued in order and
//! each written request takes the next one; a reply's segments are released
//! one by one as the client polls `available`. Everything the client does is
//! recorded.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use ubidots_client_core::Transport;

/// Which connect call the client made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectKind {
    Plain,
    Secure,
}

#[derive(Debug)]
struct Segment {
    bytes: Vec<u8>,
    after_polls: usize,
}

#[derive(Debug)]
struct MockState {
    connect_script: VecDeque<bool>,
    default_connect: bool,
    connected: bool,
    request_written: bool,
    replies: VecDeque<VecDeque<Segment>>,
    pending: VecDeque<Segment>,
    polls: usize,
    inbox: VecDeque<u8>,
    disconnect_after_response: bool,
    fail_writes: bool,
    connects: Vec<(ConnectKind, String, u16)>,
    writes: Vec<Vec<u8>>,
    flushes: usize,
    stops: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            connect_script: VecDeque::new(),
            default_connect: true,
            connected: false,
            request_written: false,
            replies: VecDeque::new(),
            pending: VecDeque::new(),
            polls: 0,
            inbox: VecDeque::new(),
            disconnect_after_response: false,
            fail_writes: false,
            connects: Vec::new(),
            writes: Vec::new(),
            flushes: 0,
            stops: 0,
        }
    }
}

impl MockState {
    fn connect(&mut self, kind: ConnectKind, host: &str, port: u16) -> bool {
        self.connects.push((kind, host.to_string(), port));
        let outcome = self
            .connect_script
            .pop_front()
            .unwrap_or(self.default_connect);
        self.connected = outcome;
        self.request_written = false;
        self.polls = 0;
        outcome
    }

    fn release_due(&mut self) {
        if !self.request_written {
            return;
        }

        while let Some(segment) = self.pending.front() {
            if self.polls < segment.after_polls {
                self.polls += 1;
                break;
            }
            if let Some(segment) = self.pending.pop_front() {
                self.inbox.extend(segment.bytes);
            }
            self.polls = 0;
        }

        if self.pending.is_empty() && self.disconnect_after_response {
            self.connected = false;
        }
    }
}

/// Mock implementation of the Transport Port
///
/// # Examples
///
/// ```rust
/// use ubidots_test_utils::{MockTransport, responses};
///
/// let transport = MockTransport::new().respond_with(responses::line_value("42.3"));
/// let handle = transport.handle();
/// assert_eq!(handle.connect_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Transport whose connects succeed and which never answers
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes of the next connect calls, in order; later calls use the default
    pub fn with_connect_script(self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.lock().connect_script.extend(outcomes);
        self
    }

    /// Make every unscripted connect fail
    pub fn refuse_connections(self) -> Self {
        self.lock().default_connect = false;
        self
    }

    /// Queue a reply released on the first poll after the next request
    pub fn respond_with(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.respond_after(0, bytes)
    }

    /// Queue a reply released after `polls` calls to `available`
    pub fn respond_after(self, polls: usize, bytes: impl Into<Vec<u8>>) -> Self {
        let segment = Segment {
            bytes: bytes.into(),
            after_polls: polls,
        };
        self.lock().replies.push_back(VecDeque::from([segment]));
        self
    }

    /// Extend the last queued reply with a segment released `polls` polls
    /// after the previous one
    pub fn then_after(self, polls: usize, bytes: impl Into<Vec<u8>>) -> Self {
        {
            let mut state = self.lock();
            let segment = Segment {
                bytes: bytes.into(),
                after_polls: polls,
            };
            if state.replies.is_empty() {
                state.replies.push_back(VecDeque::new());
            }
            if let Some(reply) = state.replies.back_mut() {
                reply.push_back(segment);
            }
        }
        self
    }

    /// Drop the connection once every queued segment has been released
    pub fn disconnect_after_response(self) -> Self {
        self.lock().disconnect_after_response = true;
        self
    }

    /// Make every write fail with a broken pipe
    pub fn fail_writes(self) -> Self {
        self.lock().fail_writes = true;
        self
    }

    /// Shared view of the recorded activity
    pub fn handle(&self) -> MockTransportHandle {
        MockTransportHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, host: &str, port: u16) -> bool {
        self.lock().connect(ConnectKind::Plain, host, port)
    }

    fn connect_secure(&mut self, host: &str, port: u16) -> bool {
        self.lock().connect(ConnectKind::Secure, host, port)
    }

    fn is_connected(&self) -> bool {
        let state = self.lock();
        state.connected || !state.inbox.is_empty()
    }

    fn available(&mut self) -> usize {
        let mut state = self.lock();
        state.release_due();
        state.inbox.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.lock().inbox.pop_front()
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        state.writes.push(data.to_vec());
        state.request_written = true;
        state.polls = 0;
        state.pending = state.replies.pop_front().unwrap_or_default();
        Ok(())
    }

    fn flush(&mut self) {
        self.lock().flushes += 1;
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        state.stops += 1;
        state.connected = false;
        state.request_written = false;
        state.pending.clear();
        state.inbox.clear();
    }
}

/// Read access to a [`MockTransport`] after it has been moved into a client
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransportHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Kinds of every connect call, in order
    pub fn connect_kinds(&self) -> Vec<ConnectKind> {
        self.lock().connects.iter().map(|(kind, _, _)| *kind).collect()
    }

    /// Host and port of every connect call, in order
    pub fn endpoints(&self) -> Vec<(String, u16)> {
        self.lock()
            .connects
            .iter()
            .map(|(_, host, port)| (host.clone(), *port))
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects.len()
    }

    /// Every request written, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.lock().writes.last().cloned()
    }

    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    pub fn stop_count(&self) -> usize {
        self.lock().stops
    }

    /// Whether the mock socket is currently open
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Replies not yet taken by a request
    pub fn queued_replies(&self) -> usize {
        self.lock().replies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_script_then_default() {
        let mut transport = MockTransport::new().with_connect_script([false, true]);
        let handle = transport.handle();

        assert!(!transport.connect("example.com", 80));
        assert!(transport.connect_secure("example.com", 443));
        assert!(transport.connect_secure("example.com", 443));
        assert_eq!(
            handle.connect_kinds(),
            vec![ConnectKind::Plain, ConnectKind::Secure, ConnectKind::Secure]
        );
        assert_eq!(handle.endpoints()[0], ("example.com".to_string(), 80));
    }

    #[test]
    fn test_response_held_until_request_written() {
        let mut transport = MockTransport::new().respond_with("OK");
        assert!(transport.connect("example.com", 9012));
        assert_eq!(transport.available(), 0);

        transport.write(b"request").unwrap();
        assert_eq!(transport.available(), 2);
        assert_eq!(transport.read_byte(), Some(b'O'));
        assert_eq!(transport.read_byte(), Some(b'K'));
        assert_eq!(transport.read_byte(), None);
    }

    #[test]
    fn test_segments_released_after_polls() {
        let mut transport = MockTransport::new()
            .respond_with("first")
            .then_after(2, "second");
        transport.connect("example.com", 80);
        transport.write(b"request").unwrap();

        assert_eq!(transport.available(), 5);
        assert_eq!(transport.available(), 5);
        assert_eq!(transport.available(), 11);
    }

    #[test]
    fn test_disconnect_after_response_keeps_buffered_bytes() {
        let mut transport = MockTransport::new()
            .respond_with("OK")
            .disconnect_after_response();
        let handle = transport.handle();
        transport.connect("example.com", 80);
        transport.write(b"request").unwrap();

        assert_eq!(transport.available(), 2);
        assert!(!handle.is_connected());
        assert!(transport.is_connected());

        transport.read_byte();
        transport.read_byte();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_stop_discards_input() {
        let mut transport = MockTransport::new().respond_with("OK");
        let handle = transport.handle();
        transport.connect("example.com", 80);
        transport.write(b"request").unwrap();
        transport.available();

        transport.flush();
        transport.stop();

        assert!(!transport.is_connected());
        assert_eq!(transport.available(), 0);
        assert_eq!(handle.flush_count(), 1);
        assert_eq!(handle.stop_count(), 1);
        assert_eq!(handle.writes(), vec![b"request".to_vec()]);
    }

    #[test]
    fn test_each_request_takes_one_reply() {
        let mut transport = MockTransport::new().respond_with("one").respond_with("two");
        let handle = transport.handle();

        transport.connect("example.com", 80);
        transport.write(b"first").unwrap();
        assert_eq!(transport.available(), 3);
        transport.stop();
        assert_eq!(handle.queued_replies(), 1);

        transport.connect("example.com", 80);
        assert_eq!(transport.available(), 0);
        transport.write(b"second").unwrap();
        assert_eq!(transport.available(), 3);
        assert_eq!(transport.read_byte(), Some(b't'));
    }

    #[test]
    fn test_failing_writes() {
        let mut transport = MockTransport::new().fail_writes();
        transport.connect("example.com", 80);
        let error = transport.write(b"request").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
    }
}
