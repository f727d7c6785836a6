//! Flow Sensor Specifications and Estimator Windows

use super::time::{MS_PER_MINUTE, MS_PER_SECOND};

/// Pulses emitted per litre by a YF-S201 sensor.
///
/// One pulse is roughly 2.25 ml at the sensor's nominal range (1-30 L/min).
/// Individual units drift by a few percent, so calibrate against a known
/// volume and override this value in `FlowConfig`.
///
/// Source: YF-S201 datasheet
pub const YF_S201_PULSES_PER_LITRE: f32 = 7.5;

/// Flow calculation window (milliseconds).
///
/// One pulse delta is converted into a rate per window.
pub const DEFAULT_CALC_INTERVAL_MS: u64 = MS_PER_SECOND;

/// Time without pulses before the rate is forced to zero (milliseconds).
///
/// At the sensor's lowest rated flow (1 L/min) pulses arrive every 8 s at
/// worst-case calibration, but in practice a 5 s gap means the tap is shut.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5 * MS_PER_SECOND;

/// Unit the reported rate is expressed in (milliseconds).
///
/// One minute: rates are litres per minute.
pub const DEFAULT_RATE_UNIT_MS: u64 = MS_PER_MINUTE;

/// Rate above which the node counts as flowing in status output.
pub const FLOWING_RATE_THRESHOLD: f32 = 0.1;
