//! The client stays silent unless its debug flag is set
//!
//! The logger is process-global, so everything runs in a single test.

mod common;

use common::harness;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;
use ubidots_client_core::{TelemetryClient, WireFormat, is_error_value};
use ubidots_test_utils::{MockTransport, responses};

struct CapturingLogger {
    records: Mutex<Vec<String>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if record.level() <= Level::Debug && record.target().starts_with("ubidots_client_core") {
            self.records
                .lock()
                .unwrap()
                .push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    records: Mutex::new(Vec::new()),
};

fn take_records() -> Vec<String> {
    std::mem::take(&mut *LOGGER.records.lock().unwrap())
}

#[test]
fn test_rejected_value_is_logged_only_in_debug_mode() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let transport = MockTransport::new()
        .respond_with(responses::http_value("1e20"))
        .respond_with(responses::http_value("1e20"));
    let mut h = harness(WireFormat::Http, transport);

    assert!(is_error_value(h.client.get("sensor1", "temp")));
    assert_eq!(take_records(), Vec::<String>::new());

    h.client.set_debug(true);
    assert!(is_error_value(h.client.get("sensor1", "temp")));
    let records = take_records();
    assert!(
        records.iter().any(|line| line.contains("scientific notation")),
        "{records:?}"
    );
}
