//! HTTP/1.1 variant of the exchange
//!
//! Writes go to `POST /api/v1.6/devices/<device>` and are judged by the
//! status line, read through the waiting reader, plus a bounded diagnostic
//! capture. Reads go to the `/lv`
//! endpoint and the chunked value is parsed straight off the socket.

use crate::protocol::client::Exchange;
use crate::protocol::codec::{
    ChunkedValueParser, DIAGNOSTIC_CAPTURE_LIMIT, detect_server_error, read_status_line,
    skip_headers,
};
use crate::protocol::debug_trace;
use crate::protocol::error::{ProtocolError, Result};
use crate::protocol::transport::{Delay, Transport};

pub(crate) fn send_data<T: Transport, D: Delay>(
    exchange: &mut Exchange<'_, T, D>,
    device_label: &str,
    payload: &str,
) -> Result<()> {
    exchange.connect_for_write()?;
    let request = exchange.builder().http_write_request(device_label, payload)?;
    exchange.transmit(&request)?;
    exchange.await_response()?;

    let (status, status_line) = read_status_line(&mut exchange.connection.reader())?;
    let captured = exchange
        .connection
        .capture_available(DIAGNOSTIC_CAPTURE_LIMIT);

    debug_trace!(
        exchange.debug(),
        "Server response:\n{}\n{}",
        String::from_utf8_lossy(&status_line).trim_end(),
        String::from_utf8_lossy(&captured)
    );

    if status >= 400 {
        let reason = String::from_utf8_lossy(&status_line).trim().to_string();
        return Err(ProtocolError::server_error(Some(status), reason));
    }

    if let Some(marker) = detect_server_error(&captured) {
        return Err(ProtocolError::server_error(Some(status), marker));
    }

    Ok(())
}

pub(crate) fn get<T: Transport, D: Delay>(
    exchange: &mut Exchange<'_, T, D>,
    device_label: &str,
    variable_label: &str,
) -> Result<f64> {
    exchange.connect_for_read()?;
    let request = exchange
        .builder()
        .http_read_request(device_label, variable_label)?;
    exchange.transmit(&request)?;
    exchange.await_response()?;

    let debug = exchange.debug();
    let mut reader = exchange.connection.reader();
    let header_lines = skip_headers(&mut reader)?;
    debug_trace!(debug, "Skipped {header_lines} response header lines");

    let value = ChunkedValueParser::parse(&mut reader).inspect_err(|e| {
        debug_trace!(debug, "Could not read the value: {e}");
    })?;
    debug_trace!(debug, "Value obtained: {value}");
    Ok(value)
}
