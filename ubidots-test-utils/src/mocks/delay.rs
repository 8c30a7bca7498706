//! Delay that records instead of sleeping

use std::sync::{Arc, Mutex};
use ubidots_client_core::Delay;

/// Records every requested pause and returns immediately
///
/// Clones share the same log, so a test can keep one clone while the client
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    calls: Arc<Mutex<Vec<u32>>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pause requested so far, in order
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of pauses requested
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Sum of all requested pauses in milliseconds
    pub fn total_ms(&self) -> u64 {
        self.calls.lock().unwrap().iter().map(|&ms| u64::from(ms)).sum()
    }

    /// Forget recorded pauses
    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Delay for RecordingDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.calls.lock().unwrap().push(ms);
    }
}
