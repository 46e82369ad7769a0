//! ## callscope-core::time
//! **Monotonic clocks for stream activity tracking**
//!
//! Streams only ever compare two readings of the same clock, so a clock
//! reports nanoseconds since an arbitrary origin. Readings never go backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic time in nanoseconds.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// Wall-independent clock backed by [`Instant`].
///
/// Readings start at 1ns so that `0` can be used as "never" by callers.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64 + 1
    }
}

/// Manually advanced clock, shared between clones.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    offset: Arc<AtomicU64>, // Nanoseconds
}

impl VirtualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            offset: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset
            .fetch_add(by.as_nanos() as u64, Ordering::Release);
    }
}

impl Clock for VirtualClock {
    fn now_ns(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }
}
