//! Nested dispatch depth tracking.
//!
//! A handler that publishes runs a nested dispatch on the same stack. The
//! guard counts nesting per thread and per bus, so a handler that republishes
//! into its own subscription is cut off instead of overflowing the stack,
//! while relaying into another bus starts that bus at depth 0.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

thread_local! {
    static DEPTH: RefCell<HashMap<BusId, usize>> = RefCell::new(HashMap::new());
}

/// Process-unique bus identity, used to key the depth counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BusId(u64);

impl BusId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BusId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Held for the duration of one dispatch on one bus.
pub(crate) struct DepthGuard {
    bus: BusId,
}

impl DepthGuard {
    /// Enter a dispatch on `bus`, or return its current depth if `max` is
    /// reached.
    pub(crate) fn enter(bus: BusId, max: usize) -> Result<Self, usize> {
        DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            let current = depths.entry(bus).or_insert(0);
            if *current >= max {
                return Err(*current);
            }
            *current += 1;
            Ok(DepthGuard { bus })
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depths| {
            let mut depths = depths.borrow_mut();
            if let Some(current) = depths.get_mut(&self.bus) {
                *current = current.saturating_sub(1);
                if *current == 0 {
                    depths.remove(&self.bus);
                }
            }
        });
    }
}

/// Dispatch nesting of `bus` on the current thread; 0 outside its handlers.
pub(crate) fn depth_of(bus: BusId) -> usize {
    DEPTH.with(|depths| depths.borrow().get(&bus).copied().unwrap_or(0))
}
