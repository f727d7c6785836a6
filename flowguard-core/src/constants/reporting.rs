//! Report Trigger Defaults

use super::time::MS_PER_SECOND;

/// Maximum time between reports (milliseconds).
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 30 * MS_PER_SECOND;

/// Relative rate change that forces a report (fraction of the last rate).
pub const DEFAULT_RATE_CHANGE_THRESHOLD: f32 = 0.1;

/// Volume step that forces a report (litres).
pub const DEFAULT_VOLUME_MILESTONE: f64 = 1.0;

/// Battery change that forces a report (percentage points).
pub const DEFAULT_AUX_CHANGE_THRESHOLD: u8 = 5;
