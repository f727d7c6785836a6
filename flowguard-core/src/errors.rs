//! Error Types for Configuration, Storage and Transport
//!
//! ## Design Philosophy
//!
//! Errors follow the same embedded rules as the rest of the crate:
//!
//! 1. **Small Size**: every variant carries at most a couple of scalars or a
//!    `&'static str`, so errors are `Copy` and cheap to return from the cycle.
//!
//! 2. **No Heap Allocation**: no `String` payloads.
//!
//! 3. **Absorbed, not propagated**: the polling cycle never returns an error.
//!    Storage and transport failures are logged and retried on a later cycle;
//!    a corrupt record becomes a cold start. Only configuration is rejected
//!    up front, before the node starts.
//!
//! ## Error Categories
//!
//! ### Configuration
//! - `ConfigError`: a value that would make the estimator or the policies
//!   meaningless (zero calibration factor, zero interval, ...)
//!
//! ### Durable Storage
//! - `StorageError::Corrupt`: record exists but fails magic/version/CRC checks
//! - `StorageError::WriteFailed` / `ReadFailed`: medium refused the operation
//!
//! ### Transport
//! - `TransportError::NotConnected`: link dropped between check and send
//! - `TransportError::Rejected` / `Timeout`: collector did not acknowledge

use thiserror_no_std::Error;

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration values rejected at startup
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Calibration factor must be a positive, finite number of pulses per unit
    #[error("Calibration factor {0} must be positive")]
    InvalidCalibration(f32),

    /// An interval that drives the cycle was zero
    #[error("Interval `{name}` must be non-zero")]
    ZeroInterval {
        /// Name of the offending interval
        name: &'static str,
    },

    /// Threshold is out of range or not a number
    #[error("Threshold `{name}` = {value} is out of range")]
    InvalidThreshold {
        /// Name of the offending threshold
        name: &'static str,
        /// The rejected value
        value: f32,
    },

    /// Storage namespace is empty or longer than the medium allows
    #[error("Namespace must be 1..={max} bytes, got {len}")]
    InvalidNamespace {
        /// Length of the supplied namespace
        len: usize,
        /// Maximum supported length
        max: usize,
    },

    /// Battery voltage window is empty or inverted
    #[error("Battery range [{min}, {max}] V is invalid")]
    InvalidBatteryRange {
        /// Configured empty-cell voltage
        min: f32,
        /// Configured full-cell voltage
        max: f32,
    },

    /// Configuration document could not be parsed
    #[error("Configuration parse error: {0}")]
    Parse(&'static str),
}

/// Durable storage failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Stored bytes do not form a valid record
    #[error("Stored record is corrupt: {reason}")]
    Corrupt {
        /// What check failed
        reason: &'static str,
    },

    /// The medium refused to read
    #[error("Storage read failed")]
    ReadFailed,

    /// The medium refused to write
    #[error("Storage write failed")]
    WriteFailed,

    /// No room left for another namespace
    #[error("Storage is full")]
    Full,
}

/// Outbound transport failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Link is down
    #[error("Not connected")]
    NotConnected,

    /// Collector did not acknowledge in time
    #[error("Timeout")]
    Timeout,

    /// Collector refused the report
    #[error("Report rejected: {0}")]
    Rejected(&'static str),
}

#[cfg(feature = "defmt")]
impl defmt::Format for StorageError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Corrupt { reason } => defmt::write!(fmt, "Corrupt record: {}", reason),
            Self::ReadFailed => defmt::write!(fmt, "Read failed"),
            Self::WriteFailed => defmt::write!(fmt, "Write failed"),
            Self::Full => defmt::write!(fmt, "Storage full"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotConnected => defmt::write!(fmt, "Not connected"),
            Self::Timeout => defmt::write!(fmt, "Timeout"),
            Self::Rejected(reason) => defmt::write!(fmt, "Rejected: {}", reason),
        }
    }
}
