//! Parse requests captured off the mock socket back into their parts

use serde_json::Value;
use std::fmt;

const DEVICES_PREFIX: &str = "/api/v1.6/devices/";

/// Error raised when captured bytes are not a well-formed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectError(pub String);

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed request: {}", self.0)
    }
}

impl std::error::Error for InspectError {}

fn malformed(message: impl Into<String>) -> InspectError {
    InspectError(message.into())
}

/// An HTTP/1.1 request split into method, path, headers and body
#[derive(Debug, Clone)]
pub struct RequestInspector {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    /// Exactly `Content-Length` bytes, or everything after the blank line
    pub body: Vec<u8>,
    /// Bytes after the declared body
    pub trailing: Vec<u8>,
}

impl RequestInspector {
    pub fn parse(raw: &[u8]) -> Result<Self, InspectError> {
        let text = std::str::from_utf8(raw).map_err(|e| malformed(e.to_string()))?;
        let (head, rest) = text
            .split_once("\r\n\r\n")
            .ok_or_else(|| malformed("no blank line after headers"))?;

        let mut lines = head.split("\r\n");
        let request_line = lines.next().ok_or_else(|| malformed("empty request"))?;
        let mut parts = request_line.split(' ');
        let (Some(method), Some(path), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed(format!("bad request line {request_line:?}")));
        };

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| malformed(format!("bad header {line:?}")))?;
            headers.push((name.to_string(), value.to_string()));
        }

        let mut inspector = Self {
            method: method.to_string(),
            path: path.to_string(),
            version: version.to_string(),
            headers,
            body: rest.as_bytes().to_vec(),
            trailing: Vec::new(),
        };

        if let Some(length) = inspector.content_length() {
            if length > rest.len() {
                return Err(malformed(format!(
                    "body has {} bytes, Content-Length says {length}",
                    rest.len()
                )));
            }
            inspector.trailing = inspector.body.split_off(length);
        }
        Ok(inspector)
    }

    /// Header value, case-insensitive name lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")?.parse().ok()
    }

    /// Device label from `/api/v1.6/devices/<device>[/...]`
    pub fn device_label(&self) -> Option<&str> {
        let rest = self.path.strip_prefix(DEVICES_PREFIX)?;
        rest.split('/').next().filter(|label| !label.is_empty())
    }

    /// Variable label from `/api/v1.6/devices/<device>/<variable>/lv`
    pub fn variable_label(&self) -> Option<&str> {
        let rest = self.path.strip_prefix(DEVICES_PREFIX)?;
        let mut segments = rest.split('/');
        segments.next()?;
        let variable = segments.next()?;
        (segments.next() == Some("lv") && segments.next().is_none()).then_some(variable)
    }

    pub fn body_str(&self) -> Result<&str, InspectError> {
        std::str::from_utf8(&self.body).map_err(|e| malformed(e.to_string()))
    }

    /// Body parsed as JSON
    pub fn body_json(&self) -> Result<Value, InspectError> {
        serde_json::from_slice(&self.body).map_err(|e| malformed(e.to_string()))
    }
}

/// A line-protocol request split on `|`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub user_agent: String,
    pub action: String,
    pub token: String,
    /// `device:variable` for reads, the full data field for writes
    pub target: String,
    pub terminator: String,
}

impl LineRequest {
    pub fn parse(raw: &[u8]) -> Result<Self, InspectError> {
        let text = std::str::from_utf8(raw).map_err(|e| malformed(e.to_string()))?;
        let fields: Vec<&str> = text.split('|').collect();
        let [user_agent, action, token, target, terminator] = fields.as_slice() else {
            return Err(malformed(format!(
                "expected 5 fields, found {}",
                fields.len()
            )));
        };

        Ok(Self {
            user_agent: user_agent.to_string(),
            action: action.to_string(),
            token: token.to_string(),
            target: target.to_string(),
            terminator: terminator.to_string(),
        })
    }

    /// `(device, variable)` of a read request
    pub fn device_and_variable(&self) -> Option<(&str, &str)> {
        self.target.split_once(':')
    }
}
