//! Bounded, node-wide event log.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;

use super::data::{EventData, EventPriority, EventRecord};
use super::path::EventPath;
use crate::matter::ids::{ClusterId, EndptId, EventId};

struct Inner {
    records: VecDeque<EventRecord>,
    next_number: u64,
}

/// Stores the most recent events of the node.
///
/// Event numbers increase monotonically for the lifetime of the log; once
/// `capacity` is reached the oldest record is evicted.
pub struct EventLog {
    inner: Mutex<Inner>,
    capacity: usize,
    start_time: Instant,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: VecDeque::with_capacity(capacity),
                next_number: 0,
            }),
            capacity: capacity.max(1),
            start_time: Instant::now(),
        }
    }

    /// Append an event and return its event number.
    pub fn record(&self, path: EventPath, priority: EventPriority, data: EventData) -> u64 {
        let system_time_ms = self.start_time.elapsed().as_millis() as u64;
        let mut inner = self.inner.lock();
        let event_number = inner.next_number;
        inner.next_number += 1;

        if inner.records.len() == self.capacity {
            inner.records.pop_front();
        }
        inner.records.push_back(EventRecord {
            path,
            event_number,
            priority,
            system_time_ms,
            data,
        });
        event_number
    }

    /// Events selected by a request path; `None` components are wildcards.
    pub fn matching(
        &self,
        endpoint: Option<EndptId>,
        cluster: Option<ClusterId>,
        event: Option<EventId>,
    ) -> Vec<EventRecord> {
        self.inner
            .lock()
            .records
            .iter()
            .filter(|r| r.path.matches(endpoint, cluster, event))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
