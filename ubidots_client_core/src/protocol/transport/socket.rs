//! std `TcpStream` adapter for the Transport Port
//!
//! Reads never block: `available` drains the socket in non-blocking mode into
//! a small receive buffer. The adapter performs no TLS handshake.

use super::Transport;
use bytes::{Buf, BytesMut};
use log::{debug, trace, warn};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Receive buffer size for one non-blocking drain
const RECV_CHUNK_SIZE: usize = 256;

/// Transport statistics
#[derive(Debug, Default, Clone)]
pub struct TransportStats {
    /// Successful connects
    pub connects: u64,
    /// Failed or refused connects
    pub connect_failures: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Send errors
    pub send_errors: u64,
    /// Receive errors
    pub receive_errors: u64,
}

/// Plain TCP transport
pub struct TcpTransport {
    stream: Option<TcpStream>,
    recv_buffer: BytesMut,
    connect_timeout: Duration,
    allow_plaintext_secure: bool,
    peer_closed: bool,
    stats: TransportStats,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    /// Create a disconnected transport
    pub fn new() -> Self {
        Self {
            stream: None,
            recv_buffer: BytesMut::with_capacity(RECV_CHUNK_SIZE),
            connect_timeout: Duration::from_secs(10),
            allow_plaintext_secure: false,
            peer_closed: false,
            stats: TransportStats::default(),
        }
    }

    /// Set the per-address connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Serve secure connects over plain TCP
    ///
    /// Only meant for endpoints that speak the protocol without TLS, such as
    /// the plain line-protocol port or a local gateway.
    pub fn allow_plaintext_secure(mut self, allow: bool) -> Self {
        self.allow_plaintext_secure = allow;
        self
    }

    /// Get transport statistics
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    fn open(&mut self, host: &str, port: u16) -> bool {
        self.stop();

        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Could not resolve {host}:{port}: {e}");
                self.stats.connect_failures += 1;
                return false;
            }
        };

        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        trace!("Could not disable Nagle on {addr}: {e}");
                    }
                    debug!("Socket connected to {addr}");
                    self.stream = Some(stream);
                    self.stats.connects += 1;
                    return true;
                }
                Err(e) => debug!("Connect to {addr} failed: {e}"),
            }
        }

        self.stats.connect_failures += 1;
        false
    }

    /// Pull at most one chunk from the socket into the receive buffer
    fn fill(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if self.peer_closed {
            return;
        }
        if let Err(e) = stream.set_nonblocking(true) {
            warn!("Could not switch socket to non-blocking mode: {e}");
            return;
        }

        let mut chunk = [0u8; RECV_CHUNK_SIZE];
        match stream.read(&mut chunk) {
            Ok(0) => {
                trace!("Peer closed the connection");
                self.peer_closed = true;
            }
            Ok(n) => {
                self.recv_buffer.extend_from_slice(&chunk[..n]);
                self.stats.bytes_received += n as u64;
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                debug!("Receive failed: {e}");
                self.stats.receive_errors += 1;
                self.peer_closed = true;
            }
        }

        if let Err(e) = stream.set_nonblocking(false) {
            warn!("Could not restore blocking mode: {e}");
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> bool {
        self.open(host, port)
    }

    fn connect_secure(&mut self, host: &str, port: u16) -> bool {
        if !self.allow_plaintext_secure {
            warn!("TcpTransport has no TLS support, refusing secure connect to {host}:{port}");
            self.stats.connect_failures += 1;
            return false;
        }
        self.open(host, port)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some() && (!self.peer_closed || !self.recv_buffer.is_empty())
    }

    fn available(&mut self) -> usize {
        if self.recv_buffer.is_empty() {
            self.fill();
        }
        self.recv_buffer.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.recv_buffer.is_empty() {
            self.fill();
        }
        if self.recv_buffer.has_remaining() {
            Some(self.recv_buffer.get_u8())
        } else {
            None
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        match stream.write_all(data) {
            Ok(()) => {
                self.stats.bytes_sent += data.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(e)
            }
        }
    }

    fn flush(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.flush() {
                debug!("Flush failed: {e}");
            }
        }
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                trace!("Shutdown returned: {e}");
            }
        }
        self.recv_buffer.clear();
        self.peer_closed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_new_transport_is_disconnected() {
        let mut transport = TcpTransport::new();
        assert!(!transport.is_connected());
        assert_eq!(transport.available(), 0);
        assert_eq!(transport.read_byte(), None);
        assert!(transport.write(b"x").is_err());
    }

    #[test]
    fn test_secure_connect_refused_without_tls() {
        let mut transport = TcpTransport::new();
        assert!(!transport.connect_secure("127.0.0.1", 9));
        assert_eq!(transport.stats().connect_failures, 1);
        assert_eq!(transport.stats().connects, 0);
    }

    #[test]
    fn test_loopback_exchange() {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(e) => {
                eprintln!("Skipping test_loopback_exchange due to network sandbox: {e:?}");
                return;
            }
        };
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 4];
            socket.read_exact(&mut request).unwrap();
            assert_eq!(&request, b"ping");
            socket.write_all(b"pong\n").unwrap();
        });

        let mut transport = TcpTransport::new().allow_plaintext_secure(true);
        assert!(transport.connect_secure("127.0.0.1", port));
        transport.write(b"ping").unwrap();
        transport.flush();

        let mut polls = 0;
        while transport.available() == 0 && polls < 2000 {
            thread::sleep(Duration::from_millis(1));
            polls += 1;
        }

        assert_eq!(transport.read_line(b'\n'), b"pong".to_vec());
        server.join().unwrap();

        assert_eq!(transport.stats().bytes_sent, 4);
        assert_eq!(transport.stats().bytes_received, 5);

        transport.stop();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_receive_buffer_holds_one_chunk() {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(e) => {
                eprintln!("Skipping test_receive_buffer_holds_one_chunk due to network sandbox: {e:?}");
                return;
            }
        };
        let port = listener.local_addr().unwrap().port();
        let payload = vec![b'x'; RECV_CHUNK_SIZE * 4];
        let expected = payload.len();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&payload).unwrap();
            socket
        });

        let mut transport = TcpTransport::new().allow_plaintext_secure(true);
        assert!(transport.connect_secure("127.0.0.1", port));
        let socket = server.join().unwrap();
        thread::sleep(Duration::from_millis(50));

        assert!(transport.available() <= RECV_CHUNK_SIZE);

        let mut received = 0;
        let mut polls = 0;
        while received < expected && polls < 2000 {
            let buffered = transport.available();
            assert!(buffered <= RECV_CHUNK_SIZE);
            if buffered == 0 {
                thread::sleep(Duration::from_millis(1));
                polls += 1;
                continue;
            }
            for _ in 0..buffered {
                assert!(transport.read_byte().is_some());
                received += 1;
            }
        }

        assert_eq!(received, expected);
        assert_eq!(transport.stats().bytes_received, expected as u64);
        drop(socket);
    }
}
