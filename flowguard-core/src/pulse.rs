//! Lock-Free Pulse Accumulator
//!
//! ## Overview
//!
//! The flow sensor produces one rising edge per ~2 ml of water. Every edge
//! must be counted: a missed pulse is volume that silently disappears from the
//! lifetime total. The edge interrupt is therefore never masked and its handler
//! does the bare minimum.
//!
//! ```text
//! Sensor ISR (preempts)              Polling cycle
//!      ↓                                  ↓
//!   store tick ──(Relaxed)──┐        load count (Acquire)
//!   fetch_add count (Release) ──────→ load tick  (Relaxed)
//!      ↓                                  ↓
//!   Never blocks                     Coherent snapshot
//! ```
//!
//! ## Memory Ordering
//!
//! The handler writes the timestamp first, then publishes the increment with
//! `Release`. The reader loads the count with `Acquire` before the timestamp,
//! so any snapshot that includes a pulse also sees that pulse's time (or a
//! later one). The reverse tear, a newer timestamp with an older count, is
//! harmless: the pulse is counted on the next tick and the fresher timestamp
//! can only postpone idle detection.
//!
//! ## Width
//!
//! Both fields are 32 bits so the handler stays a single native atomic on
//! targets without 64-bit atomics (RISC-V ESP32 parts, Cortex-M0+). The count
//! wraps after 2^32 pulses, about 570 million litres on a YF-S201. The tick
//! wraps every ~49.7 days; idle detection only compares differences with
//! wrapping arithmetic, which is exact for gaps below that.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::time::Timestamp;

/// Pulse counter shared between the edge interrupt and the polling cycle
///
/// `const`-constructible so it can live in a `static` that the interrupt
/// handler reaches without any other state.
///
/// ```rust
/// use flowguard_core::PulseAccumulator;
///
/// static PULSES: PulseAccumulator = PulseAccumulator::new();
///
/// PULSES.record_event(1_000);
/// PULSES.record_event(1_120);
///
/// let snapshot = PULSES.snapshot();
/// assert_eq!(snapshot.count, 2);
/// assert_eq!(snapshot.ms_since_last_pulse(1_500), 380);
/// ```
#[derive(Debug)]
pub struct PulseAccumulator {
    /// Pulses seen since power-on, wrapping
    count: AtomicU32,
    /// Low 32 bits of the timestamp of the latest pulse
    last_pulse_tick: AtomicU32,
}

/// Coherent view of the accumulator at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseSnapshot {
    /// Pulses since power-on, wrapping
    pub count: u32,
    /// Low 32 bits of the latest pulse timestamp
    pub last_pulse_tick: u32,
}

impl PulseSnapshot {
    /// Milliseconds since the latest pulse, exact for gaps under ~49 days
    #[inline]
    pub fn ms_since_last_pulse(&self, now: Timestamp) -> u64 {
        (now as u32).wrapping_sub(self.last_pulse_tick) as u64
    }

    /// Pulses counted since `earlier`, wraparound-safe
    #[inline]
    pub fn pulses_since(&self, earlier: &PulseSnapshot) -> u32 {
        self.count.wrapping_sub(earlier.count)
    }
}

impl PulseAccumulator {
    /// Zeroed accumulator
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            last_pulse_tick: AtomicU32::new(0),
        }
    }

    /// Record one sensor edge at `now`
    ///
    /// Call from the rising-edge interrupt. Bounded time, no locks, no
    /// allocation; safe to preempt and to run concurrently with `snapshot`.
    #[inline]
    pub fn record_event(&self, now: Timestamp) {
        self.last_pulse_tick.store(now as u32, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Read count and last pulse time
    #[inline]
    pub fn snapshot(&self) -> PulseSnapshot {
        let count = self.count.load(Ordering::Acquire);
        let last_pulse_tick = self.last_pulse_tick.load(Ordering::Relaxed);
        PulseSnapshot {
            count,
            last_pulse_tick,
        }
    }

    /// Pulses counted so far
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

impl Default for PulseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
