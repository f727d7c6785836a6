//! Node configuration
//!
//! Everything here is fixed for the life of the process: supplied at
//! startup, validated once, never hot-reloaded. Defaults match the reference
//! hardware (see `constants`).
//!
//! ```rust
//! use flowguard_core::config::{MeterConfig, FlowConfig};
//!
//! let config = MeterConfig {
//!     flow: FlowConfig { calibration_factor: 7.2, ..FlowConfig::default() },
//!     ..MeterConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use heapless::String;

use crate::constants::{
    battery::{
        BATTERY_CRITICAL_PERCENT, BATTERY_DIVIDER_RATIO, BATTERY_MAX_VOLTAGE,
        BATTERY_MIN_VOLTAGE, BATTERY_WARNING_PERCENT, DEFAULT_BATTERY_CHECK_INTERVAL_MS,
    },
    flow::{
        DEFAULT_CALC_INTERVAL_MS, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_RATE_UNIT_MS,
        YF_S201_PULSES_PER_LITRE,
    },
    persistence::{
        DEFAULT_MAX_SAVE_INTERVAL_MS, DEFAULT_NAMESPACE, DEFAULT_SAVE_THRESHOLD,
        MAX_NAMESPACE_LEN,
    },
    reporting::{
        DEFAULT_AUX_CHANGE_THRESHOLD, DEFAULT_RATE_CHANGE_THRESHOLD, DEFAULT_REPORT_INTERVAL_MS,
        DEFAULT_VOLUME_MILESTONE,
    },
    time::MS_PER_MINUTE,
};
use crate::errors::{ConfigError, ConfigResult};

/// Storage namespace, bounded by the key-value store's key length
pub type Namespace = String<MAX_NAMESPACE_LEN>;

/// Pulse-to-flow conversion settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlowConfig {
    /// Pulses per litre
    pub calibration_factor: f32,
    /// Length of one rate window (ms)
    pub calc_interval_ms: u64,
    /// Pulse gap after which the rate is forced to zero (ms)
    pub idle_timeout_ms: u64,
    /// Unit the rate is expressed in (ms); one minute gives L/min
    pub rate_unit_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            calibration_factor: YF_S201_PULSES_PER_LITRE,
            calc_interval_ms: DEFAULT_CALC_INTERVAL_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            rate_unit_ms: DEFAULT_RATE_UNIT_MS,
        }
    }
}

impl FlowConfig {
    /// Multiplier from "litres per window" to "litres per rate unit"
    pub fn rate_scale(&self) -> f32 {
        self.rate_unit_ms as f32 / self.calc_interval_ms as f32
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(self.calibration_factor.is_finite() && self.calibration_factor > 0.0) {
            return Err(ConfigError::InvalidCalibration(self.calibration_factor));
        }
        check_interval("calc_interval", self.calc_interval_ms)?;
        check_interval("idle_timeout", self.idle_timeout_ms)?;
        check_interval("rate_unit", self.rate_unit_ms)
    }
}

/// Report trigger settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReportConfig {
    /// Longest gap between reports (ms)
    pub interval_ms: u64,
    /// Relative rate change that forces a report (0.1 = 10 %)
    pub rate_change_threshold: f32,
    /// Volume step that forces a report (litres, > 0)
    pub volume_milestone: f64,
    /// Auxiliary change that forces a report; `None` disables the rule
    pub aux_change_threshold: Option<u8>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            rate_change_threshold: DEFAULT_RATE_CHANGE_THRESHOLD,
            volume_milestone: DEFAULT_VOLUME_MILESTONE,
            aux_change_threshold: None,
        }
    }
}

impl ReportConfig {
    fn validate(&self) -> ConfigResult<()> {
        check_interval("report_interval", self.interval_ms)?;
        check_threshold("rate_change_threshold", self.rate_change_threshold)?;
        check_positive("volume_milestone", self.volume_milestone as f32)
    }
}

/// Durable storage settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PersistConfig {
    /// Volume change that forces a save (litres, > 0)
    pub save_threshold: f64,
    /// Longest gap between saves (ms)
    pub max_save_interval_ms: u64,
    /// Key-value namespace holding the record
    pub namespace: Namespace,
}

impl Default for PersistConfig {
    fn default() -> Self {
        let mut namespace = Namespace::new();
        // DEFAULT_NAMESPACE is shorter than MAX_NAMESPACE_LEN
        let _ = namespace.push_str(DEFAULT_NAMESPACE);
        Self {
            save_threshold: DEFAULT_SAVE_THRESHOLD,
            max_save_interval_ms: DEFAULT_MAX_SAVE_INTERVAL_MS,
            namespace,
        }
    }
}

impl PersistConfig {
    /// Replace the namespace, rejecting empty or over-long names
    pub fn with_namespace(mut self, name: &str) -> ConfigResult<Self> {
        let invalid = ConfigError::InvalidNamespace {
            len: name.len(),
            max: MAX_NAMESPACE_LEN,
        };
        if name.is_empty() {
            return Err(invalid);
        }
        let mut namespace = Namespace::new();
        namespace.push_str(name).map_err(|_| invalid)?;
        self.namespace = namespace;
        Ok(self)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.namespace.is_empty() {
            return Err(ConfigError::InvalidNamespace {
                len: 0,
                max: MAX_NAMESPACE_LEN,
            });
        }
        check_positive("save_threshold", self.save_threshold as f32)?;
        check_interval("max_save_interval", self.max_save_interval_ms)
    }
}

/// Battery monitor settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BatteryConfig {
    /// Empty-cell voltage (V)
    pub min_voltage: f32,
    /// Full-cell voltage (V)
    pub max_voltage: f32,
    /// ADC voltage / battery voltage
    pub divider_ratio: f32,
    /// Interval between samples (ms)
    pub check_interval_ms: u64,
    /// Percentage below which a warning is logged
    pub warning_percent: u8,
    /// Percentage below which a critical warning is logged
    pub critical_percent: u8,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            min_voltage: BATTERY_MIN_VOLTAGE,
            max_voltage: BATTERY_MAX_VOLTAGE,
            divider_ratio: BATTERY_DIVIDER_RATIO,
            check_interval_ms: DEFAULT_BATTERY_CHECK_INTERVAL_MS,
            warning_percent: BATTERY_WARNING_PERCENT,
            critical_percent: BATTERY_CRITICAL_PERCENT,
        }
    }
}

impl BatteryConfig {
    fn validate(&self) -> ConfigResult<()> {
        let range_ok = self.min_voltage.is_finite()
            && self.max_voltage.is_finite()
            && self.min_voltage >= 0.0
            && self.max_voltage > self.min_voltage;
        if !range_ok {
            return Err(ConfigError::InvalidBatteryRange {
                min: self.min_voltage,
                max: self.max_voltage,
            });
        }
        if !(self.divider_ratio.is_finite() && self.divider_ratio > 0.0) {
            return Err(ConfigError::InvalidThreshold {
                name: "divider_ratio",
                value: self.divider_ratio,
            });
        }
        check_interval("battery_check_interval", self.check_interval_ms)
    }
}

/// Complete node configuration
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MeterConfig {
    /// Flow estimation
    pub flow: FlowConfig,
    /// Reporting policy
    pub report: ReportConfig,
    /// Persistence policy
    pub persist: PersistConfig,
    /// Optional battery channel
    pub battery: Option<BatteryConfig>,
}

impl MeterConfig {
    /// Reference hardware: YF-S201 sensor, no battery
    pub fn yf_s201() -> Self {
        Self::default()
    }

    /// Fewer flash writes: save every 10 L or 30 minutes
    ///
    /// For meters on high-traffic lines where the default policy would write
    /// more than a few thousand times a day.
    pub fn low_wear() -> Self {
        Self {
            persist: PersistConfig {
                save_threshold: 10.0,
                max_save_interval_ms: 30 * MS_PER_MINUTE,
                ..PersistConfig::default()
            },
            ..Self::default()
        }
    }

    /// Enable the battery channel and its report rule
    pub fn with_battery(mut self, battery: BatteryConfig) -> Self {
        self.battery = Some(battery);
        if self.report.aux_change_threshold.is_none() {
            self.report.aux_change_threshold = Some(DEFAULT_AUX_CHANGE_THRESHOLD);
        }
        self
    }

    /// Check every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.flow.validate()?;
        self.report.validate()?;
        self.persist.validate()?;
        if let Some(battery) = &self.battery {
            battery.validate()?;
        }
        Ok(())
    }

    /// Parse and validate a JSON document; missing fields take defaults
    #[cfg(feature = "std")]
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|_| ConfigError::Parse("invalid JSON configuration"))?;
        config.validate()?;
        Ok(config)
    }
}

fn check_interval(name: &'static str, value_ms: u64) -> ConfigResult<()> {
    if value_ms == 0 {
        Err(ConfigError::ZeroInterval { name })
    } else {
        Ok(())
    }
}

fn check_threshold(name: &'static str, value: f32) -> ConfigResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}

fn check_positive(name: &'static str, value: f32) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}
