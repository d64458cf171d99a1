//! Monotonic time sources.
//!
//! Feature code stamps events with [`Clock::now`], milliseconds since the agent
//! started. [`SystemClock`] never goes backwards; [`ManualClock`] is driven by hand
//! in tests and simulations.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic millisecond clock.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock's origin. Never decreases.
    fn now(&self) -> u64;

    /// Wall-clock time of the origin, in Unix milliseconds.
    fn offset(&self) -> i64 {
        0
    }
}

/// Clock backed by [`Instant`], anchored to the wall-clock time it was created.
pub struct SystemClock {
    start: Instant,
    offset: i64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Utc::now().timestamp_millis(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn offset(&self) -> i64 {
        self.offset
    }
}

/// Hand-driven clock.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
    offset: i64,
}

impl ManualClock {
    pub fn new(offset: i64) -> Self {
        Self {
            now: AtomicU64::new(0),
            offset,
        }
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Move the clock to `millis`; earlier values are ignored.
    pub fn set(&self, millis: u64) {
        self.now.fetch_max(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn offset(&self) -> i64 {
        self.offset
    }
}
