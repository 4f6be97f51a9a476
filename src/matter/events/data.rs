//! Event records emitted by the cluster servers.

use super::path::EventPath;
use crate::matter::clusters::faults::BootReason;

/// Event priority levels as defined by Matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventPriority {
    /// Debug events - low priority, may be dropped
    Debug = 0,
    /// Info events - normal priority
    Info = 1,
    /// Critical events - high priority, should not be dropped
    Critical = 2,
}

/// A single emitted event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Event path (endpoint, cluster, event ID)
    pub path: EventPath,
    /// Sequential event number (never resets, unique per node)
    pub event_number: u64,
    pub priority: EventPriority,
    /// Milliseconds since the event log was created
    pub system_time_ms: u64,
    pub data: EventData,
}

/// Event data payload types.
///
/// Fault lists carry raw fault codes, current set first as on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    /// Empty event (no additional data)
    Empty,
    /// BootReason event (General Diagnostics)
    BootReason { boot_reason: BootReason },
    /// HardwareFaultChange event (General Diagnostics)
    HardwareFaultChange { current: Vec<u8>, previous: Vec<u8> },
    /// RadioFaultChange event (General Diagnostics)
    RadioFaultChange { current: Vec<u8>, previous: Vec<u8> },
    /// NetworkFaultChange event (General Diagnostics)
    NetworkFaultChange { current: Vec<u8>, previous: Vec<u8> },
    /// SoftwareFault event (Software Diagnostics)
    SoftwareFault {
        id: u64,
        name: Option<String>,
        fault_recording: Vec<u8>,
    },
}
