//! Recent-call ring buffer.
//!
//! One record per forwarded call, appended after the call completes or
//! fails. The ring has a fixed capacity; the oldest record is evicted first.
//! Nothing is persisted.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// One forwarded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub method: String,
    pub path: String,
    pub target_path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub request_id: String,
    pub route: String,
    /// Taxonomy code when the call did not end in a 2xx/3xx relay.
    pub error: Option<String>,
}

impl ObservationRecord {
    pub fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Fixed-capacity, newest-first readable ring of [`ObservationRecord`]s.
///
/// Constructed once at startup and shared through `Arc`. Appends hold the
/// lock only for a push and an optional pop.
#[derive(Debug)]
pub struct ObservabilitySink {
    capacity: usize,
    ring: Mutex<VecDeque<ObservationRecord>>,
}

impl ObservabilitySink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, record: ObservationRecord) {
        // A poisoned lock still holds a consistent ring; keep recording
        let mut ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(record);
    }

    /// The last `n` records, newest first.
    pub fn recent(&self, n: usize) -> Vec<ObservationRecord> {
        let ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        ring.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
