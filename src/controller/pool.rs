//! Bounded allocation of command objects.
//!
//! Every live command holds a [`PoolSlot`]; the slot is released when the
//! command is dropped, on whatever path that happens.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::error;

use crate::error::{NodeError, Result};

#[derive(Default)]
struct Counters {
    in_use: AtomicUsize,
    allocated: AtomicUsize,
    released: AtomicUsize,
}

pub struct CommandPool {
    capacity: usize,
    counters: Arc<Counters>,
}

impl CommandPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Reserve a slot; fails with `NoMemory` when `capacity` commands are alive.
    pub fn acquire(&self) -> Result<PoolSlot> {
        let capacity = self.capacity;
        self.counters
            .in_use
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| {
                error!("Failed to alloc memory for command: {} in flight", capacity);
                NodeError::NoMemory("command pool exhausted")
            })?;
        self.counters.allocated.fetch_add(1, Ordering::SeqCst);
        Ok(PoolSlot {
            counters: self.counters.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Commands currently alive.
    pub fn in_use(&self) -> usize {
        self.counters.in_use.load(Ordering::SeqCst)
    }

    pub fn allocated_total(&self) -> usize {
        self.counters.allocated.load(Ordering::SeqCst)
    }

    pub fn released_total(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }
}

/// Ownership token for one pool entry.
pub struct PoolSlot {
    counters: Arc<Counters>,
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.counters.in_use.fetch_sub(1, Ordering::SeqCst);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}
