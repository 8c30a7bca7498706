//! Request encoder for both wire formats
//!
//! Every request is written into a buffer allocated with its exact final
//! length, computed up front from the literal template and the argument
//! lengths. Labels and payloads are not escaped or validated: callers must
//! keep CR/LF out of labels, `|` out of line-protocol fields and unescaped
//! `"` out of JSON payloads.

use crate::protocol::API_DEVICES_PATH;
use crate::protocol::error::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use log::trace;
use std::fmt::Write as _;

/// Literal part of an HTTP write request, without any substituted value
const HTTP_WRITE_SKELETON: &str = concat!(
    "POST  HTTP/1.1\r\n",
    "Host: \r\n",
    "User-Agent: \r\n",
    "X-Auth-Token: \r\n",
    "Connection: close\r\n",
    "Content-Type: application/json\r\n",
    "Content-Length: \r\n",
    "\r\n",
    "\r\n",
);

/// Literal part of an HTTP last-value request
const HTTP_READ_SKELETON: &str = concat!(
    "GET  HTTP/1.1\r\n",
    "Host: \r\n",
    "X-Auth-Token: \r\n",
    "User-Agent: \r\n",
    "Content-Type: application/json\r\n",
    "Connection: close\r\n",
    "\r\n",
);

/// Literal part of a line-protocol last-value request
const LINE_READ_SKELETON: &str = "|LV||:|end";

/// Suffix of a last-value path
const LAST_VALUE_SUFFIX: &str = "/lv";

/// Number of decimal digits needed to print `n`
pub fn count_digits(n: usize) -> usize {
    let mut digits = 1;
    let mut rest = n / 10;
    while rest > 0 {
        digits += 1;
        rest /= 10;
    }
    digits
}

/// Exact length of a device endpoint path
///
/// `/api/v1.6/devices/<device>` for writes, or
/// `/api/v1.6/devices/<device>/<variable>/lv` when a variable is given.
pub fn path_length(device_label: &str, variable_label: Option<&str>) -> usize {
    let base = API_DEVICES_PATH.len() + device_label.len();
    match variable_label {
        Some(variable) => base + 1 + variable.len() + LAST_VALUE_SUFFIX.len(),
        None => base,
    }
}

/// Render a request for tracing with the token masked
pub fn redact(request: &[u8], token: &str) -> String {
    let text = String::from_utf8_lossy(request);
    if token.is_empty() {
        text.into_owned()
    } else {
        text.replace(token, "***")
    }
}

/// Builds wire requests for one endpoint identity
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    host: &'a str,
    user_agent: &'a str,
    token: &'a str,
}

impl<'a> RequestBuilder<'a> {
    /// Create a builder for the given host and credentials
    pub fn new(host: &'a str, user_agent: &'a str, token: &'a str) -> Self {
        Self {
            host,
            user_agent,
            token,
        }
    }

    /// Exact byte length of the HTTP write request
    pub fn http_write_length(&self, device_label: &str, payload: &str) -> usize {
        HTTP_WRITE_SKELETON.len()
            + path_length(device_label, None)
            + self.host.len()
            + self.user_agent.len()
            + self.token.len()
            + count_digits(payload.len())
            + payload.len()
    }

    /// Build `POST /api/v1.6/devices/<device>` carrying a JSON payload
    pub fn http_write_request(&self, device_label: &str, payload: &str) -> Result<Bytes> {
        if payload.is_empty() {
            return Err(ProtocolError::encoding("Empty payload"));
        }

        let path = build_path(device_label, None);
        let expected = self.http_write_length(device_label, payload);
        let mut buffer = BytesMut::with_capacity(expected);

        write!(
            buffer,
            "POST {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             User-Agent: {user_agent}\r\n\
             X-Auth-Token: {token}\r\n\
             Connection: close\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {length}\r\n\
             \r\n\
             {payload}\r\n",
            host = self.host,
            user_agent = self.user_agent,
            token = self.token,
            length = payload.len(),
        )
        .map_err(|_| ProtocolError::encoding("Could not format HTTP write request"))?;

        finish(buffer, expected)
    }

    /// Exact byte length of the HTTP last-value request
    pub fn http_read_length(&self, device_label: &str, variable_label: &str) -> usize {
        HTTP_READ_SKELETON.len()
            + path_length(device_label, Some(variable_label))
            + self.host.len()
            + self.token.len()
            + self.user_agent.len()
    }

    /// Build `GET /api/v1.6/devices/<device>/<variable>/lv`
    pub fn http_read_request(&self, device_label: &str, variable_label: &str) -> Result<Bytes> {
        let path = build_path(device_label, Some(variable_label));
        let expected = self.http_read_length(device_label, variable_label);
        let mut buffer = BytesMut::with_capacity(expected);

        write!(
            buffer,
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             X-Auth-Token: {token}\r\n\
             User-Agent: {user_agent}\r\n\
             Content-Type: application/json\r\n\
             Connection: close\r\n\
             \r\n",
            host = self.host,
            token = self.token,
            user_agent = self.user_agent,
        )
        .map_err(|_| ProtocolError::encoding("Could not format HTTP read request"))?;

        finish(buffer, expected)
    }

    /// Exact byte length of the line-protocol last-value request
    pub fn line_read_length(&self, device_label: &str, variable_label: &str) -> usize {
        LINE_READ_SKELETON.len()
            + self.user_agent.len()
            + self.token.len()
            + device_label.len()
            + variable_label.len()
    }

    /// Build `<user_agent>|LV|<token>|<device>:<variable>|end`, no trailing newline
    pub fn line_read_request(&self, device_label: &str, variable_label: &str) -> Result<Bytes> {
        let expected = self.line_read_length(device_label, variable_label);
        let mut buffer = BytesMut::with_capacity(expected);

        for field in [
            self.user_agent,
            "|LV|",
            self.token,
            "|",
            device_label,
            ":",
            variable_label,
            "|end",
        ] {
            buffer.put_slice(field.as_bytes());
        }

        finish(buffer, expected)
    }

    /// Line-protocol writes carry the caller-framed payload unchanged
    pub fn line_write_request(&self, payload: &str) -> Result<Bytes> {
        if payload.is_empty() {
            return Err(ProtocolError::encoding("Empty payload"));
        }
        Ok(Bytes::copy_from_slice(payload.as_bytes()))
    }
}

fn build_path(device_label: &str, variable_label: Option<&str>) -> String {
    let mut path = String::with_capacity(path_length(device_label, variable_label));
    path.push_str(API_DEVICES_PATH);
    path.push_str(device_label);
    if let Some(variable) = variable_label {
        path.push('/');
        path.push_str(variable);
        path.push_str(LAST_VALUE_SUFFIX);
    }
    path
}

fn finish(buffer: BytesMut, expected: usize) -> Result<Bytes> {
    if buffer.len() != expected {
        return Err(ProtocolError::encoding(format!(
            "Request length {} differs from computed length {expected}",
            buffer.len()
        )));
    }
    trace!("Encoded {expected} byte request");
    Ok(buffer.freeze())
}
