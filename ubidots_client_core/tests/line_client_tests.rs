//! End-to-end tests of the line-protocol variant over a scripted transport

mod common;

use common::{TOKEN, USER_AGENT, harness};
use ubidots_client_core::{
    ERROR_VALUE, ProtocolError, RequestPhase, TelemetryClient, WireFormat, is_error_value,
};
use ubidots_test_utils::{ConnectKind, LineRequest, MockTransport, responses};

#[test]
fn test_get_value_after_final_delimiter() {
    let transport = MockTransport::new().respond_with("ubidots|LV|12345|sensor1:temp|42.3");
    let mut h = harness(WireFormat::Line, transport);

    assert_eq!(h.client.get("sensor1", "temp"), 42.3);
}

#[test]
fn test_get_across_split_segments() {
    let transport = MockTransport::new()
        .respond_with("OK|42")
        .then_after(20, ".3");
    let mut h = harness(WireFormat::Line, transport);

    assert_eq!(h.client.try_get("sensor1", "temp").unwrap(), 42.3);
    assert!(h.delay.calls().iter().all(|&ms| ms == 1));
    assert!(h.delay.total_ms() <= 50);
}

#[test]
fn test_get_stops_reading_when_peer_closes() {
    let transport = MockTransport::new()
        .respond_with(responses::line_value("7.5"))
        .disconnect_after_response();
    let mut h = harness(WireFormat::Line, transport);

    assert_eq!(h.client.get("sensor1", "temp"), 7.5);
    assert_eq!(h.delay.call_count(), 0);
}

#[test]
fn test_trickling_answer_stays_within_timeout() {
    let transport = MockTransport::new()
        .respond_with("OK|1")
        .then_after(30, "2")
        .then_after(30, "3")
        .then_after(30, "4");
    let mut h = harness(WireFormat::Line, transport);

    // Whatever arrived before the budget ran out is parsed
    let value = h.client.try_get("sensor1", "temp").unwrap();
    assert!(value < 1234.0);
    assert!(h.delay.total_ms() <= 50);
}

#[test]
fn test_get_request_layout() {
    let transport = MockTransport::new().respond_with(responses::line_value("42.3"));
    let mut h = harness(WireFormat::Line, transport);

    assert_eq!(h.client.get("sensor1", "temp"), 42.3);

    let raw = h.transport.last_write().unwrap();
    assert_eq!(raw, format!("{USER_AGENT}|LV|{TOKEN}|sensor1:temp|end").into_bytes());
    assert!(!raw.ends_with(b"\n"));

    let request = LineRequest::parse(&raw).unwrap();
    assert_eq!(request.action, "LV");
    assert_eq!(request.device_and_variable(), Some(("sensor1", "temp")));

    assert_eq!(h.transport.connect_kinds(), vec![ConnectKind::Secure]);
    assert_eq!(
        h.transport.endpoints(),
        vec![("industrial.api.ubidots.com".to_string(), 9812)]
    );
    assert_eq!(h.client.last_phase(), RequestPhase::Closed);
}

#[test]
fn test_get_without_delimiter_fails() {
    let transport = MockTransport::new()
        .respond_with("ERROR")
        .respond_with("ERROR");
    let mut h = harness(WireFormat::Line, transport);

    assert_eq!(h.client.get("sensor1", "temp"), ERROR_VALUE);
    assert!(matches!(
        h.client.try_get("sensor1", "temp"),
        Err(ProtocolError::Parse { .. })
    ));
}

#[test]
fn test_get_non_numeric_value_fails() {
    let transport = MockTransport::new().respond_with("OK|warm");
    let mut h = harness(WireFormat::Line, transport);

    assert!(is_error_value(h.client.get("sensor1", "temp")));
}

#[test]
fn test_get_timeout_closes_socket() {
    let mut h = harness(WireFormat::Line, MockTransport::new());

    let result = h.client.try_get("sensor1", "temp");

    assert!(matches!(result, Err(ProtocolError::Timeout(_))));
    // Once when the wait gives up, once when the exchange ends
    assert_eq!(h.transport.stop_count(), 2);
    assert_eq!(h.delay.total_ms(), 50);
    assert!(!h.client.server_connected());
}

#[test]
fn test_send_data_ok_ack() {
    let payload = "RustUbidots/test|POST|BBFF-test-token|sensor1:Sensor One=>temp:23.4|end";
    let transport = MockTransport::new().respond_with(responses::line_ok());
    let mut h = harness(WireFormat::Line, transport);

    assert!(h.client.send_data("sensor1", "Sensor One", payload));

    // Written verbatim, no extra framing
    assert_eq!(h.transport.writes(), vec![payload.as_bytes().to_vec()]);
    assert_eq!(h.transport.connect_kinds(), vec![ConnectKind::Secure]);
}

#[test]
fn test_send_data_ok_anywhere_in_answer() {
    let transport = MockTransport::new().respond_with("status: OK\r\n");
    let mut h = harness(WireFormat::Line, transport);

    assert!(h.client.send_data("sensor1", "Sensor One", "payload|end"));
}

#[test]
fn test_send_data_error_answer() {
    let transport = MockTransport::new()
        .respond_with(responses::line_error())
        .respond_with(responses::line_error());
    let mut h = harness(WireFormat::Line, transport);

    assert!(!h.client.send_data("sensor1", "Sensor One", "payload|end"));

    let error = h
        .client
        .try_send_data("sensor1", "Sensor One", "payload|end")
        .unwrap_err();
    assert!(error.is_server_side());
}

#[test]
fn test_send_data_reconnects_securely() {
    let transport = MockTransport::new()
        .with_connect_script([false, false, true])
        .respond_with(responses::line_ok())
        .disconnect_after_response();
    let mut h = harness(WireFormat::Line, transport);

    assert!(h.client.send_data("sensor1", "Sensor One", "payload|end"));
    assert_eq!(h.transport.connect_kinds(), vec![ConnectKind::Secure; 3]);
    assert_eq!(h.delay.calls(), vec![1000, 1000]);
}

#[test]
fn test_send_data_connect_failure() {
    let transport = MockTransport::new().refuse_connections();
    let mut h = harness(WireFormat::Line, transport);

    let result = h.client.try_send_data("sensor1", "Sensor One", "payload|end");

    assert!(matches!(
        result,
        Err(ProtocolError::ConnectFailure { attempts: 3, port: 9812, .. })
    ));
    assert!(h.transport.writes().is_empty());
    assert_eq!(h.client.last_phase(), RequestPhase::Closed);
}

#[test]
fn test_capture_is_bounded() {
    let mut answer = b"OK|1.5".to_vec();
    answer.extend(std::iter::repeat_n(b' ', 1024));
    answer.extend_from_slice(b"|99");
    let transport = MockTransport::new().respond_with(answer);
    let mut h = harness(WireFormat::Line, transport);

    // Only the first 512 bytes are considered
    assert_eq!(h.client.get("sensor1", "temp"), 1.5);
}
