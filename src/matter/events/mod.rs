//! Matter events emitted by the node's cluster servers.
//!
//! Events in Matter are different from attributes:
//! - Events have sequential event numbers that never reset
//! - Events have timestamps and priorities
//! - Events are read through event paths, which may be wildcards

pub mod data;
mod event_log;
mod path;

pub use data::{EventData, EventPriority, EventRecord};
pub use event_log::EventLog;
pub use path::EventPath;
