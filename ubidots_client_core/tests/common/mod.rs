//! Shared setup for client integration tests

#![allow(dead_code)]

use ubidots_client_core::{ProtocolClient, ProtocolConfig, WireFormat};
use ubidots_test_utils::{MockTransport, MockTransportHandle, RecordingDelay};

pub const TOKEN: &str = "BBFF-test-token";
pub const USER_AGENT: &str = "RustUbidots/test";

pub type MockClient = ProtocolClient<MockTransport, RecordingDelay>;

/// Configuration with short bounds so failure paths stay cheap
pub fn test_config() -> ProtocolConfig {
    ProtocolConfig::new(TOKEN)
        .with_user_agent(USER_AGENT)
        .with_timeout_ms(50)
        .with_max_reconnect_attempts(3)
}

pub struct Harness {
    pub client: MockClient,
    pub transport: MockTransportHandle,
    pub delay: RecordingDelay,
}

pub fn harness(format: WireFormat, transport: MockTransport) -> Harness {
    harness_with_config(test_config(), format, transport)
}

pub fn harness_with_config(
    config: ProtocolConfig,
    format: WireFormat,
    transport: MockTransport,
) -> Harness {
    let handle = transport.handle();
    let delay = RecordingDelay::new();
    let client = ProtocolClient::with_delay(config, format, transport, delay.clone())
        .expect("test configuration is valid");

    Harness {
        client,
        transport: handle,
        delay,
    }
}
