//! Protocol client facade over the HTTP and line-protocol formats
//!
//! Each call runs one complete exchange: connect, build, transmit, wait,
//! parse, close. The socket is acquired at the start of every call and always
//! released before it returns.

use crate::error::ValidationError;
use crate::protocol::codec::{RequestBuilder, redact};
use crate::protocol::error::{ProtocolError, Result};
use crate::protocol::transport::{
    ConnectMode, ConnectionManager, ConnectionPolicy, ConnectionState, Delay, PhaseTransition,
    RequestPhase, StdDelay, Transport,
};
use crate::protocol::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_SERVER, DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT,
    ERROR_VALUE, RECONNECT_DELAY_MS, debug_trace, http, line,
};
use crate::security::AuthToken;
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire format used by a client, fixed at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// HTTP/1.1 requests against the REST endpoint
    #[default]
    Http,
    /// Pipe-delimited line protocol
    #[serde(alias = "tcp")]
    Line,
}

impl WireFormat {
    /// Port of the TLS endpoint for this format
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => crate::protocol::DEFAULT_HTTP_PORT,
            Self::Line => crate::protocol::DEFAULT_LINE_PORT,
        }
    }

    /// Port of the plaintext endpoint for this format
    pub fn plaintext_port(&self) -> u16 {
        match self {
            Self::Http => crate::protocol::PLAINTEXT_HTTP_PORT,
            Self::Line => crate::protocol::PLAINTEXT_LINE_PORT,
        }
    }

    /// How the first connect attempt of a write is made
    fn write_connect_mode(&self) -> ConnectMode {
        match self {
            Self::Http => ConnectMode::Plain,
            Self::Line => ConnectMode::Secure,
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Line => write!(f, "line"),
        }
    }
}

/// Protocol client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Server host name
    pub host: String,
    /// Server port, the wire format's default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Device token
    pub token: AuthToken,
    /// Identity tag sent as `User-Agent` and first line-protocol field
    pub user_agent: String,
    /// Response timeout in milliseconds
    pub timeout_ms: u32,
    /// Total connect attempts per request
    pub max_reconnect_attempts: u32,
    /// Pause between connect attempts in milliseconds
    pub reconnect_delay_ms: u32,
    /// Verbose request/response tracing
    pub debug: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER.to_string(),
            port: None,
            token: AuthToken::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            debug: false,
        }
    }
}

impl ProtocolConfig {
    /// Default configuration for the given token
    pub fn new(token: impl Into<AuthToken>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay_ms(mut self, delay_ms: u32) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Port to dial for a wire format
    pub fn port_for(&self, format: WireFormat) -> u16 {
        self.port.unwrap_or_else(|| format.default_port())
    }

    /// Retry and timeout bounds for the connection manager
    pub fn connection_policy(&self) -> ConnectionPolicy {
        ConnectionPolicy {
            timeout_ms: self.timeout_ms,
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_delay_ms: self.reconnect_delay_ms,
        }
    }

    /// Check that every request built from this configuration is well formed
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::missing_field("host"));
        }
        if self.token.is_empty() {
            return Err(ValidationError::missing_field("token"));
        }
        if self.port == Some(0) {
            return Err(ValidationError::invalid_parameter("port", "must not be zero"));
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::invalid_parameter(
                "timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ValidationError::invalid_parameter(
                "max_reconnect_attempts",
                "must be greater than zero",
            ));
        }

        let fields = [
            ("host", self.host.as_str()),
            ("user_agent", self.user_agent.as_str()),
            ("token", self.token.expose()),
        ];
        for (name, value) in fields {
            if value.contains(['\r', '\n']) {
                return Err(ValidationError::invalid_configuration(&format!(
                    "{name} contains a line break"
                )));
            }
            if name != "host" && value.contains('|') {
                return Err(ValidationError::invalid_configuration(&format!(
                    "{name} contains the '|' delimiter"
                )));
            }
        }
        Ok(())
    }
}

/// Capability shared by both wire-format variants
pub trait TelemetryClient {
    /// Send a pre-formatted payload to a device; `true` on success
    fn send_data(&mut self, device_label: &str, device_name: &str, payload: &str) -> bool;

    /// Fetch the last value of a variable, [`ERROR_VALUE`] on any failure
    fn get(&mut self, device_label: &str, variable_label: &str) -> f64;

    /// Whether the socket is currently connected
    fn server_connected(&self) -> bool;

    /// Toggle verbose tracing
    fn set_debug(&mut self, debug: bool);
}

/// High-level protocol client
pub struct ProtocolClient<T, D = StdDelay> {
    config: ProtocolConfig,
    format: WireFormat,
    port: u16,
    connection: ConnectionManager<T, D>,
    phase: RequestPhase,
}

impl<T: Transport> ProtocolClient<T, StdDelay> {
    /// Create a client that waits with `std::thread::sleep`
    pub fn new(config: ProtocolConfig, format: WireFormat, transport: T) -> crate::Result<Self> {
        Self::with_delay(config, format, transport, StdDelay)
    }
}

impl<T: Transport, D: Delay> ProtocolClient<T, D> {
    /// Create a client with an explicit delay capability
    pub fn with_delay(
        config: ProtocolConfig,
        format: WireFormat,
        transport: T,
        delay: D,
    ) -> crate::Result<Self> {
        config.validate()?;

        let port = config.port_for(format);
        let mut connection = ConnectionManager::new(transport, delay, config.connection_policy());
        connection.set_debug(config.debug);

        debug_trace!(
            config.debug,
            "Created {format} client for {}:{port} (token: {})",
            config.host,
            config.token
        );

        Ok(Self {
            config,
            format,
            port,
            connection,
            phase: RequestPhase::Idle,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Wire format in use
    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Port dialed by every request
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Phase the last request ended in
    pub fn last_phase(&self) -> RequestPhase {
        self.phase
    }

    /// Connection state as last observed by the connection manager
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        self.connection.transport_mut()
    }

    /// Send a payload, reporting the failure kind
    pub fn try_send_data(
        &mut self,
        device_label: &str,
        device_name: &str,
        payload: &str,
    ) -> Result<()> {
        debug_trace!(
            self.config.debug,
            "Sending data to device {device_label} ({device_name}) over {}",
            self.format
        );

        let format = self.format;
        let mut exchange = self.begin();
        let outcome = match format {
            WireFormat::Http => http::send_data(&mut exchange, device_label, payload),
            WireFormat::Line => line::send_data(&mut exchange, payload),
        };
        exchange.finish();
        outcome
    }

    /// Fetch a last value, reporting the failure kind
    pub fn try_get(&mut self, device_label: &str, variable_label: &str) -> Result<f64> {
        let format = self.format;
        let mut exchange = self.begin();
        let outcome = match format {
            WireFormat::Http => http::get(&mut exchange, device_label, variable_label),
            WireFormat::Line => line::get(&mut exchange, device_label, variable_label),
        };
        exchange.finish();
        outcome
    }

    fn begin(&mut self) -> Exchange<'_, T, D> {
        let mut exchange = Exchange {
            connection: &mut self.connection,
            config: &self.config,
            port: self.port,
            format: self.format,
            phase: &mut self.phase,
        };
        if *exchange.phase != RequestPhase::Idle {
            exchange.advance(RequestPhase::Idle);
        }
        exchange
    }
}

impl<T: Transport, D: Delay> TelemetryClient for ProtocolClient<T, D> {
    fn send_data(&mut self, device_label: &str, device_name: &str, payload: &str) -> bool {
        match self.try_send_data(device_label, device_name, payload) {
            Ok(()) => true,
            Err(e) => {
                debug_trace!(self.config.debug, "send_data to {device_label} failed: {e}");
                false
            }
        }
    }

    fn get(&mut self, device_label: &str, variable_label: &str) -> f64 {
        match self.try_get(device_label, variable_label) {
            Ok(value) => value,
            Err(e) => {
                debug_trace!(
                    self.config.debug,
                    "get {device_label}/{variable_label} failed: {e}"
                );
                ERROR_VALUE
            }
        }
    }

    fn server_connected(&self) -> bool {
        self.connection.is_connected()
    }

    fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
        self.connection.set_debug(debug);
    }
}

/// One request in flight: the socket, its identity and the phase tracker
pub(crate) struct Exchange<'a, T, D> {
    pub(crate) connection: &'a mut ConnectionManager<T, D>,
    config: &'a ProtocolConfig,
    port: u16,
    format: WireFormat,
    phase: &'a mut RequestPhase,
}

impl<'a, T: Transport, D: Delay> Exchange<'a, T, D> {
    pub(crate) fn debug(&self) -> bool {
        self.config.debug
    }

    pub(crate) fn builder(&self) -> RequestBuilder<'a> {
        let config = self.config;
        RequestBuilder::new(&config.host, &config.user_agent, config.token.expose())
    }

    pub(crate) fn advance(&mut self, next: RequestPhase) {
        let transition = PhaseTransition::new(*self.phase, next);
        if let Some(message) = transition.validation_error() {
            warn!("{message}");
        }
        trace!("Request phase: {} -> {next}", *self.phase);
        *self.phase = next;
    }

    /// Connect for a read; reads always start secure
    pub(crate) fn connect_for_read(&mut self) -> Result<()> {
        self.connect(ConnectMode::Secure)
    }

    /// Connect for a write using the format's first-attempt mode
    pub(crate) fn connect_for_write(&mut self) -> Result<()> {
        self.connect(self.format.write_connect_mode())
    }

    fn connect(&mut self, mode: ConnectMode) -> Result<()> {
        self.advance(RequestPhase::Connecting);
        let config = self.config;
        let host = config.host.as_str();
        if self.connection.ensure_connected(host, self.port, mode) {
            self.advance(RequestPhase::Connected);
            Ok(())
        } else {
            self.advance(RequestPhase::Failed);
            Err(ProtocolError::connect_failure(
                host,
                self.port,
                self.connection.last_connect_attempts(),
            ))
        }
    }

    pub(crate) fn transmit(&mut self, request: &[u8]) -> Result<()> {
        self.advance(RequestPhase::Sending);
        debug_trace!(
            self.config.debug,
            "Sending request:\n{}",
            redact(request, self.config.token.expose())
        );
        self.connection.send(request)
    }

    pub(crate) fn await_response(&mut self) -> Result<()> {
        self.advance(RequestPhase::Waiting);
        if self.connection.wait_for_response() {
            self.advance(RequestPhase::Parsing);
            Ok(())
        } else {
            Err(ProtocolError::Timeout(self.connection.policy().timeout()))
        }
    }

    /// Release the socket and end in `Closed`
    fn finish(mut self) {
        self.connection.close();
        if *self.phase != RequestPhase::Closed {
            self.advance(RequestPhase::Closed);
        }
    }
}
