//! Backoff gate for repetitive error logging.
//!
//! Counts occurrences per `service:error_kind`. Operational errors are logged
//! on occurrence 0 and then on every power of two from 2 upwards.
//! Configuration errors are logged exactly once.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Error kind for invalid static configuration (bad URL, missing mapping)
pub const CONFIG_ERROR: &str = "config_error";

pub struct ErrorLogGate {
    counts: Mutex<HashMap<String, u64>>,
}

impl ErrorLogGate {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Record one occurrence and decide whether it should be logged.
    /// The counter is incremented even when the answer is `false`.
    pub fn should_log(&self, service: &str, error_kind: &str) -> bool {
        let key = gate_key(service, error_kind);
        let mut counts = self.counts.lock();
        let count = counts.entry(key).or_insert(0);
        let occurrence = *count;
        *count += 1;
        decide(error_kind, occurrence)
    }

    /// Forget all occurrences for `service:error_kind`. Call on the next
    /// success so a later failure is treated as fresh.
    pub fn reset_count(&self, service: &str, error_kind: &str) {
        self.counts.lock().remove(&gate_key(service, error_kind));
    }

    /// Reset several kinds for one service at once
    pub fn reset_kinds(&self, service: &str, error_kinds: &[&str]) {
        let mut counts = self.counts.lock();
        for kind in error_kinds {
            counts.remove(&gate_key(service, kind));
        }
    }

    pub fn count(&self, service: &str, error_kind: &str) -> u64 {
        self.counts
            .lock()
            .get(&gate_key(service, error_kind))
            .copied()
            .unwrap_or(0)
    }
}

impl Default for ErrorLogGate {
    fn default() -> Self {
        Self::new()
    }
}

fn gate_key(service: &str, error_kind: &str) -> String {
    format!("{}:{}", service, error_kind)
}

fn decide(error_kind: &str, occurrence: u64) -> bool {
    if occurrence == 0 {
        return true;
    }
    if error_kind == CONFIG_ERROR {
        return false;
    }
    occurrence >= 2 && occurrence.is_power_of_two()
}
