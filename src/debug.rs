//! Explicit debug sink. Callers record events deliberately; nothing hooks
//! global I/O.

use crate::models::debug::DebugEvent;
use std::collections::VecDeque;
use std::sync::Mutex;

pub trait DebugSink: Send + Sync {
    fn record(&self, event: DebugEvent);
}

/// Ring buffer keeping the most recent `capacity` events.
#[derive(Debug)]
pub struct DebugLog {
    capacity: usize,
    events: Mutex<VecDeque<DebugEvent>>,
}

impl DebugLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Oldest first.
    pub fn events(&self) -> Vec<DebugEvent> {
        match self.events.lock() {
            Ok(events) => events.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl DebugSink for DebugLog {
    fn record(&self, event: DebugEvent) {
        let Ok(mut events) = self.events.lock() else {
            log::warn!("debug log lock poisoned; dropping event");
            return;
        };
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}
