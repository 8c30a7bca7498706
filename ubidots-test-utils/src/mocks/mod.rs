//! Mock implementations for testing

mod delay;
mod transport;

pub use delay::RecordingDelay;
pub use transport::{ConnectKind, MockTransport, MockTransportHandle};
