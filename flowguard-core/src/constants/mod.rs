//! Constants for FlowGuard Core
//!
//! Default values for every tunable in `MeterConfig`, plus the unit
//! conversions the estimator relies on. Values are those of the reference
//! hardware: a YF-S201 hall-effect sensor on an ESP32-class board with an
//! NVS-style key-value store.
//!
//! ## Organization
//!
//! - **Time**: unit conversions
//! - **Flow**: sensor calibration and estimator windows
//! - **Reporting**: report cadence and change thresholds
//! - **Persistence**: save policy and storage limits
//! - **Battery**: optional auxiliary channel

/// Time unit conversions.
pub mod time;

/// Sensor calibration and flow estimator defaults.
pub mod flow;

/// Report trigger defaults.
pub mod reporting;

/// Wear-aware persistence defaults.
pub mod persistence;

/// Battery monitor defaults.
pub mod battery;

pub use time::{MS_PER_MINUTE, MS_PER_SECOND};

pub use flow::{
    DEFAULT_CALC_INTERVAL_MS, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_RATE_UNIT_MS,
    FLOWING_RATE_THRESHOLD, YF_S201_PULSES_PER_LITRE,
};

pub use reporting::{
    DEFAULT_AUX_CHANGE_THRESHOLD, DEFAULT_RATE_CHANGE_THRESHOLD, DEFAULT_REPORT_INTERVAL_MS,
    DEFAULT_VOLUME_MILESTONE,
};

pub use persistence::{
    DEFAULT_MAX_SAVE_INTERVAL_MS, DEFAULT_NAMESPACE, DEFAULT_SAVE_THRESHOLD, MAX_NAMESPACE_LEN,
};

pub use battery::{
    BATTERY_CRITICAL_PERCENT, BATTERY_WARNING_PERCENT, DEFAULT_BATTERY_CHECK_INTERVAL_MS,
};
