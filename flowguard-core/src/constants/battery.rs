//! Battery Monitor Defaults
//!
//! Values for a single 3.7 V Li-ion cell read through a 1:2 resistor divider.

use super::time::MS_PER_MINUTE;

/// Voltage treated as an empty cell (volts).
pub const BATTERY_MIN_VOLTAGE: f32 = 3.0;

/// Voltage treated as a full cell (volts).
pub const BATTERY_MAX_VOLTAGE: f32 = 4.2;

/// Ratio of ADC voltage to battery voltage for a 200k/200k divider.
pub const BATTERY_DIVIDER_RATIO: f32 = 0.5;

/// Interval between battery samples (milliseconds).
pub const DEFAULT_BATTERY_CHECK_INTERVAL_MS: u64 = MS_PER_MINUTE;

/// ADC readings averaged per sample.
pub const BATTERY_SAMPLE_COUNT: usize = 16;

/// Charge level at which a warning is logged (percent).
pub const BATTERY_WARNING_PERCENT: u8 = 25;

/// Charge level at which a critical warning is logged (percent).
pub const BATTERY_CRITICAL_PERCENT: u8 = 10;
