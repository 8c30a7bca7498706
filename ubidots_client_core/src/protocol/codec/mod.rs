//! Request building and response parsing
//!
//! The encoder computes the exact byte length of a request before allocating
//! it. The decoder consumes the answer one byte at a time through a
//! [`ByteSource`], so no buffer sized for the whole response is ever needed.

mod decoder;
mod encoder;

pub use decoder::{
    CHUNK_SIZE_MAX_DIGITS, ChunkedValueParser, DIAGNOSTIC_CAPTURE_LIMIT, LINE_CAPTURE_LIMIT,
    MAX_HEADER_BYTES, STATUS_LINE_LIMIT, VALUE_CAPACITY, ValueParserState, detect_server_error,
    parse_line_ack, parse_line_value, parse_status_line, read_status_line, skip_headers,
};
pub use encoder::{RequestBuilder, count_digits, path_length, redact};

use crate::protocol::error::{ProtocolError, Result};

/// Pull-based source of response bytes
pub trait ByteSource {
    /// Next byte of the response, or an error when none will arrive
    fn next_byte(&mut self) -> Result<u8>;
}

impl ByteSource for &[u8] {
    fn next_byte(&mut self) -> Result<u8> {
        let (&first, rest) = self
            .split_first()
            .ok_or_else(|| ProtocolError::parse("unexpected end of response"))?;
        *self = rest;
        Ok(first)
    }
}
