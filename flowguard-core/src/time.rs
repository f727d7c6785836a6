//! Time management for the polling cycle
//!
//! All timing in the core is based on sampling a monotonic millisecond clock;
//! nothing waits on a timer. The cycle receives `now` as a plain argument, so
//! the clock is only needed by whoever drives the loop:
//! - Hardware tick counter on the device
//! - `MonotonicClock` on hosts
//! - `ManualClock` in tests and simulations

/// Milliseconds since device boot
pub type Timestamp = u64;

/// Elapsed milliseconds between two readings of a monotonic clock.
///
/// Saturates at zero if `later` is behind `earlier`, so a misbehaving clock
/// can delay a timeout but never fire one early.
#[inline]
pub fn elapsed_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}

/// Source of monotonic time
pub trait TimeSource {
    /// Current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// Monotonic host clock, zeroed at construction
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Start a clock at zero
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}

/// Hand-driven clock for tests and simulations
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    timestamp: Timestamp,
}

impl ManualClock {
    /// Clock starting at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to an absolute time
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Move forward by `ms`
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}
