//! Line-protocol variant of the exchange
//!
//! Both directions are single short lines, so the answer is captured in bulk
//! into a bounded buffer once the first byte arrives. The capture keeps going
//! across segments until the peer goes quiet for [`LINE_IDLE_MS`].

use crate::protocol::client::Exchange;
use crate::protocol::codec::{LINE_CAPTURE_LIMIT, parse_line_ack, parse_line_value};
use crate::protocol::debug_trace;
use crate::protocol::error::Result;
use crate::protocol::transport::{Delay, Transport};

/// Silence after the last byte that ends a line-protocol answer
const LINE_IDLE_MS: u32 = 100;

pub(crate) fn send_data<T: Transport, D: Delay>(
    exchange: &mut Exchange<'_, T, D>,
    payload: &str,
) -> Result<()> {
    exchange.connect_for_write()?;
    let request = exchange.builder().line_write_request(payload)?;
    exchange.transmit(&request)?;
    let captured = capture_response(exchange)?;

    parse_line_ack(&captured)
}

pub(crate) fn get<T: Transport, D: Delay>(
    exchange: &mut Exchange<'_, T, D>,
    device_label: &str,
    variable_label: &str,
) -> Result<f64> {
    exchange.connect_for_read()?;
    let request = exchange
        .builder()
        .line_read_request(device_label, variable_label)?;
    exchange.transmit(&request)?;
    let captured = capture_response(exchange)?;

    let value = parse_line_value(&captured)?;
    debug_trace!(exchange.debug(), "Value obtained: {value}");
    Ok(value)
}

/// Wait for the answer and take what is readable; the socket is closed
/// straight away on timeout
fn capture_response<T: Transport, D: Delay>(exchange: &mut Exchange<'_, T, D>) -> Result<Vec<u8>> {
    if let Err(e) = exchange.await_response() {
        exchange.connection.close();
        return Err(e);
    }

    let captured = exchange
        .connection
        .capture_until_idle(LINE_CAPTURE_LIMIT, LINE_IDLE_MS);
    debug_trace!(
        exchange.debug(),
        "Server response: {}",
        String::from_utf8_lossy(&captured)
    );
    Ok(captured)
}
