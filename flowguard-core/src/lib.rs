//! Core measurement engine for FlowGuard
//!
//! Turns raw pulses from a hall-effect flow sensor into a flow rate and a
//! cumulative volume, decides when that state is worth reporting, and keeps
//! the volume across restarts without wearing out the storage medium.
//!
//! Key constraints:
//! - Pulse counting happens in interrupt context: lock-free, no allocation
//! - Everything else runs in one cooperative polling cycle
//! - No heap allocation after startup
//! - Nothing in the cycle is fatal; failures are absorbed and retried
//!
//! ```no_run
//! use flowguard_core::{FlowMeter, MeterConfig, PulseAccumulator};
//! use flowguard_core::storage::MemoryStore;
//! use flowguard_core::transport::LoopbackTransport;
//!
//! static PULSES: PulseAccumulator = PulseAccumulator::new();
//!
//! // Interrupt handler, bound to the sensor's rising edge
//! fn on_rising_edge(now_ms: u64) {
//!     PULSES.record_event(now_ms);
//! }
//!
//! let mut meter = FlowMeter::start(
//!     MeterConfig::default(),
//!     &PULSES,
//!     MemoryStore::<1>::new(),
//!     LoopbackTransport::<8>::connected(),
//!     0,
//! ).unwrap();
//!
//! // Main loop
//! let report = meter.cycle(1_000);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod logging;

pub mod battery;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flow;
pub mod meter;
pub mod persist;
pub mod pulse;
pub mod report;
pub mod storage;
pub mod time;
pub mod transport;
pub mod volume;

// Public API
pub use battery::{AuxSensor, BatteryMonitor};
pub use config::MeterConfig;
pub use errors::{ConfigError, StorageError, TransportError};
pub use flow::{FlowEstimator, FlowSample};
pub use meter::{CycleReport, FlowMeter, NodeStatus};
pub use persist::PersistenceManager;
pub use pulse::{PulseAccumulator, PulseSnapshot};
pub use report::{FlowReport, ReportOutcome, ReportReason, ReportTrigger};
pub use storage::{DurableRecord, DurableStore};
pub use time::{TimeSource, Timestamp};
pub use transport::Transport;
pub use volume::VolumeAccumulator;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
