//! Response decoder for both wire formats
//!
//! HTTP answers are consumed byte by byte: headers are skipped with a tiny
//! line state machine and the chunked body is parsed into a fixed-size value
//! buffer. Line-protocol answers are short enough to be captured in bulk into
//! a bounded buffer and searched.

use super::ByteSource;
use crate::protocol::error::{ProtocolError, Result};
use log::trace;

/// Longest accepted chunk-size token, in hex digits
pub const CHUNK_SIZE_MAX_DIGITS: usize = 2;

/// Capacity of the fixed decimal value buffer
///
/// An `f64` carries at most 17 significant digits; sign, decimal point and a
/// little headroom for trailing zeros fit in the rest. Longer values are
/// rejected as overflow rather than truncated.
pub const VALUE_CAPACITY: usize = 32;

/// Upper bound on header bytes skipped before giving up
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Bytes captured after an HTTP write status line for diagnostics
pub const DIAGNOSTIC_CAPTURE_LIMIT: usize = 512;

/// Longest accepted HTTP status line, line feed included
pub const STATUS_LINE_LIMIT: usize = 256;

/// Bytes captured from a line-protocol answer
pub const LINE_CAPTURE_LIMIT: usize = 512;

/// Markers of an application error inside a captured HTTP response
const SERVER_ERROR_MARKERS: [&str; 2] = ["400 Bad Request", "Internal Server Error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderLine {
    Start,
    CarriageReturn,
    Content,
}

/// Consume HTTP header lines up to and including the blank line
///
/// Returns the number of header lines skipped (status line included). Only
/// the position within the current line is tracked, never its content.
pub fn skip_headers<S: ByteSource>(source: &mut S) -> Result<usize> {
    let mut line = HeaderLine::Start;
    let mut lines = 0;
    let mut consumed = 0;

    loop {
        if consumed == MAX_HEADER_BYTES {
            return Err(ProtocolError::parse(format!(
                "headers exceed {MAX_HEADER_BYTES} bytes"
            )));
        }
        let byte = source.next_byte()?;
        consumed += 1;

        line = match (line, byte) {
            (HeaderLine::CarriageReturn, b'\n') => {
                trace!("Skipped {lines} header lines ({consumed} bytes)");
                return Ok(lines);
            }
            (HeaderLine::Start, b'\r') => HeaderLine::CarriageReturn,
            (_, b'\n') => {
                lines += 1;
                HeaderLine::Start
            }
            _ => HeaderLine::Content,
        };
    }
}

/// Where the chunked value parser currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueParserState {
    /// Reading the hex chunk-size token
    ChunkSize,
    /// Discarding the line feed after the chunk size
    ChunkSizeLineFeed,
    /// Reading the value token
    Value,
    /// Discarding the line feed after the value
    ValueLineFeed,
    /// Value parsed, stream aligned after its line feed
    Complete,
}

/// Push parser for a single-value chunked HTTP body
///
/// Expects `<hex size>\r\n<value>\r\n`. The value is collected into a fixed
/// buffer of [`VALUE_CAPACITY`] bytes.
#[derive(Debug, Clone)]
pub struct ChunkedValueParser {
    state: ValueParserState,
    size_digits: [u8; CHUNK_SIZE_MAX_DIGITS],
    size_len: usize,
    expected: usize,
    value: [u8; VALUE_CAPACITY],
    value_len: usize,
}

impl Default for ChunkedValueParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedValueParser {
    /// Create a parser positioned at the chunk-size token
    pub fn new() -> Self {
        Self {
            state: ValueParserState::ChunkSize,
            size_digits: [0; CHUNK_SIZE_MAX_DIGITS],
            size_len: 0,
            expected: 0,
            value: [0; VALUE_CAPACITY],
            value_len: 0,
        }
    }

    /// Parse one value from a byte source
    pub fn parse<S: ByteSource>(source: &mut S) -> Result<f64> {
        let mut parser = Self::new();
        loop {
            if let Some(value) = parser.feed(source.next_byte()?)? {
                return Ok(value);
            }
        }
    }

    /// Current parser state
    pub fn state(&self) -> ValueParserState {
        self.state
    }

    /// Declared value length, known once the chunk size has been read
    pub fn expected_len(&self) -> usize {
        self.expected
    }

    /// Feed one byte; returns the value once its line is complete
    pub fn feed(&mut self, byte: u8) -> Result<Option<f64>> {
        match self.state {
            ValueParserState::ChunkSize => self.feed_chunk_size(byte).map(|_| None),
            ValueParserState::ChunkSizeLineFeed => {
                self.state = ValueParserState::Value;
                Ok(None)
            }
            ValueParserState::Value => self.feed_value(byte).map(|_| None),
            ValueParserState::ValueLineFeed => {
                let value = self.decode_value()?;
                self.state = ValueParserState::Complete;
                Ok(Some(value))
            }
            ValueParserState::Complete => Err(ProtocolError::parse(
                "value already parsed, no more bytes expected",
            )),
        }
    }

    fn feed_chunk_size(&mut self, byte: u8) -> Result<()> {
        match byte {
            b'\r' => {
                self.expected = self.decode_chunk_size()?;
                trace!("Chunk length: {}", self.expected);
                self.state = ValueParserState::ChunkSizeLineFeed;
                Ok(())
            }
            b'<' => Err(html_error()),
            digit if digit.is_ascii_hexdigit() => {
                if self.size_len == CHUNK_SIZE_MAX_DIGITS {
                    return Err(ProtocolError::parse(format!(
                        "chunk size longer than {CHUNK_SIZE_MAX_DIGITS} hex digits"
                    )));
                }
                self.size_digits[self.size_len] = digit;
                self.size_len += 1;
                Ok(())
            }
            other => Err(ProtocolError::parse(format!(
                "unexpected byte {other:#04x} in chunk size"
            ))),
        }
    }

    fn decode_chunk_size(&self) -> Result<usize> {
        if self.size_len == 0 {
            return Err(ProtocolError::parse("missing chunk size"));
        }

        let size = self.size_digits[..self.size_len]
            .iter()
            .fold(0usize, |acc, &digit| acc * 16 + hex_value(digit));

        if size == 0 {
            return Err(ProtocolError::parse("empty chunk, no value in response"));
        }
        if size > VALUE_CAPACITY {
            return Err(ProtocolError::buffer_overflow(size, VALUE_CAPACITY));
        }
        Ok(size)
    }

    fn feed_value(&mut self, byte: u8) -> Result<()> {
        match byte {
            b'\r' => {
                if self.value_len != self.expected {
                    return Err(ProtocolError::parse(format!(
                        "value has {} bytes, chunk announced {}",
                        self.value_len, self.expected
                    )));
                }
                self.state = ValueParserState::ValueLineFeed;
                Ok(())
            }
            b'e' | b'E' => Err(ProtocolError::parse(
                "value in scientific notation exceeds the decimal buffer",
            )),
            b'<' => Err(html_error()),
            other => {
                if self.value_len == self.expected {
                    return Err(ProtocolError::parse(format!(
                        "value longer than the announced {} bytes",
                        self.expected
                    )));
                }
                self.value[self.value_len] = other;
                self.value_len += 1;
                Ok(())
            }
        }
    }

    fn decode_value(&self) -> Result<f64> {
        let text = std::str::from_utf8(&self.value[..self.value_len])
            .map_err(|e| ProtocolError::parse(format!("value is not UTF-8: {e}")))?;
        parse_decimal(text)
    }
}

fn hex_value(digit: u8) -> usize {
    match digit {
        b'0'..=b'9' => usize::from(digit - b'0'),
        b'a'..=b'f' => usize::from(digit - b'a' + 10),
        b'A'..=b'F' => usize::from(digit - b'A' + 10),
        _ => 0,
    }
}

fn html_error() -> ProtocolError {
    ProtocolError::server_error(None, "HTML error page instead of a value")
}

/// Parse a finite decimal number, ignoring surrounding whitespace
fn parse_decimal(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|e| ProtocolError::parse(format!("invalid number {trimmed:?}: {e}")))?;

    if !value.is_finite() {
        return Err(ProtocolError::parse(format!(
            "non-finite value {trimmed:?}"
        )));
    }
    Ok(value)
}

/// Extract the status code from an HTTP status line
pub fn parse_status_line(line: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(line).ok()?;
    let mut parts = text.split_ascii_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Read the HTTP status line and extract its code
///
/// Consumes bytes up to and including the first `\n`. Returns the code and
/// the line without its line feed.
pub fn read_status_line<S: ByteSource>(source: &mut S) -> Result<(u16, Vec<u8>)> {
    let mut line = Vec::new();
    loop {
        let byte = source.next_byte()?;
        if byte == b'\n' {
            break;
        }
        if line.len() + 1 == STATUS_LINE_LIMIT {
            return Err(ProtocolError::parse(format!(
                "status line exceeds {STATUS_LINE_LIMIT} bytes"
            )));
        }
        line.push(byte);
    }

    let status = parse_status_line(&line).ok_or_else(|| {
        ProtocolError::parse(format!(
            "malformed status line {:?}",
            String::from_utf8_lossy(&line).trim_end()
        ))
    })?;
    Ok((status, line))
}

/// Find an application error marker in captured HTTP bytes
pub fn detect_server_error(captured: &[u8]) -> Option<&'static str> {
    SERVER_ERROR_MARKERS
        .into_iter()
        .find(|marker| contains(captured, marker.as_bytes()))
}

/// Line-protocol write acknowledgement: succeeds if `OK` appears anywhere
pub fn parse_line_ack(captured: &[u8]) -> Result<()> {
    if contains(captured, b"OK") {
        return Ok(());
    }

    let text = String::from_utf8_lossy(captured);
    let text = text.trim();
    if text.starts_with("ERROR") {
        Err(ProtocolError::server_error(None, text))
    } else {
        Err(ProtocolError::parse(format!(
            "no OK acknowledgement in {text:?}"
        )))
    }
}

/// Line-protocol last value: the number after the final `|`
pub fn parse_line_value(captured: &[u8]) -> Result<f64> {
    let delimiter = captured
        .iter()
        .rposition(|&byte| byte == b'|')
        .ok_or_else(|| ProtocolError::parse("missing '|' delimiter"))?;

    let text = std::str::from_utf8(&captured[delimiter + 1..])
        .map_err(|e| ProtocolError::parse(format!("value is not UTF-8: {e}")))?;
    parse_decimal(text)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}
