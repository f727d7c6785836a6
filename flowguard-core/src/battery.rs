//! Battery monitor
//!
//! An optional auxiliary channel: a Li-ion cell read through a resistive
//! divider on an ADC pin. The percentage it produces rides along in flow
//! reports and drives the aux-change report rule.
//!
//! Conversion is linear between the empty and full voltages. That is a crude
//! model of a Li-ion discharge curve, but it is monotonic, which is all the
//! report rule and the warning levels need.

use crate::config::BatteryConfig;
use crate::constants::battery::BATTERY_SAMPLE_COUNT;
use crate::time::{elapsed_ms, Timestamp};

/// Source of raw ADC readings (millivolts at the pin)
pub trait AuxSensor {
    /// Sensor-specific failure
    type Error;

    /// One conversion; `WouldBlock` when the ADC is busy
    fn read_millivolts(&mut self) -> nb::Result<u16, Self::Error>;
}

impl<S: AuxSensor + ?Sized> AuxSensor for &mut S {
    type Error = S::Error;

    fn read_millivolts(&mut self) -> nb::Result<u16, Self::Error> {
        (**self).read_millivolts()
    }
}

/// Battery voltage for an ADC reading taken behind a divider
///
/// `divider_ratio` is pin voltage over battery voltage (0.5 for 1:2).
#[inline]
pub fn millivolts_to_voltage(adc_mv: u16, divider_ratio: f32) -> f32 {
    adc_mv as f32 / 1000.0 / divider_ratio
}

/// Charge estimate, 0-100, clamped to the `[min, max]` window
pub fn voltage_to_percent(voltage: f32, min: f32, max: f32) -> u8 {
    let clamped = voltage.clamp(min, max);
    let fraction = (clamped - min) / (max - min);
    // Truncates, so 100 only at or above `max`
    (fraction * 100.0) as u8
}

/// Alert level for a charge percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryLevel {
    /// At or above the warning level
    Normal,
    /// Below the warning level
    Warning,
    /// Below the critical level
    Critical,
}

impl BatteryLevel {
    /// Classify `percent` against the configured levels
    pub fn classify(percent: u8, config: &BatteryConfig) -> Self {
        if percent < config.critical_percent {
            Self::Critical
        } else if percent < config.warning_percent {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// Samples the battery on its own interval and keeps the latest estimate
#[derive(Debug, Clone)]
pub struct BatteryMonitor {
    config: BatteryConfig,
    last_check: Option<Timestamp>,
    voltage: Option<f32>,
    percent: Option<u8>,
}

impl BatteryMonitor {
    /// Monitor for a validated `BatteryConfig`; nothing sampled yet
    pub fn new(config: &BatteryConfig) -> Self {
        Self {
            config: config.clone(),
            last_check: None,
            voltage: None,
            percent: None,
        }
    }

    /// Latest charge estimate
    pub fn percent(&self) -> Option<u8> {
        self.percent
    }

    /// Latest averaged voltage
    pub fn voltage(&self) -> Option<f32> {
        self.voltage
    }

    /// Sample if the check interval has elapsed; returns the current estimate
    ///
    /// The first call always samples. A busy ADC (`WouldBlock`) is retried on
    /// the next call; a sensor error waits a full interval. Either way the
    /// previous estimate is kept.
    pub fn poll<S: AuxSensor>(&mut self, now: Timestamp, sensor: &mut S) -> Option<u8> {
        if let Some(last) = self.last_check {
            if elapsed_ms(last, now) <= self.config.check_interval_ms {
                return self.percent;
            }
        }

        match self.sample(sensor) {
            Ok(voltage) => {
                let percent = voltage_to_percent(
                    voltage,
                    self.config.min_voltage,
                    self.config.max_voltage,
                );
                self.voltage = Some(voltage);
                self.percent = Some(percent);
                self.last_check = Some(now);
                self.announce(percent);
            }
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(_)) => {
                log_warn!("Battery read failed, keeping previous estimate");
                self.last_check = Some(now);
            }
        }

        self.percent
    }

    fn sample<S: AuxSensor>(&self, sensor: &mut S) -> nb::Result<f32, S::Error> {
        let mut sum: u32 = 0;
        for _ in 0..BATTERY_SAMPLE_COUNT {
            sum += sensor.read_millivolts()? as u32;
        }
        let mean_mv = (sum / BATTERY_SAMPLE_COUNT as u32) as u16;
        Ok(millivolts_to_voltage(mean_mv, self.config.divider_ratio))
    }

    fn announce(&self, percent: u8) {
        match BatteryLevel::classify(percent, &self.config) {
            BatteryLevel::Critical => {
                log_error!("Battery CRITICAL: {}%", percent);
            }
            BatteryLevel::Warning => {
                log_warn!("Battery low: {}%", percent);
            }
            BatteryLevel::Normal => {
                log_debug!("Battery: {}%", percent);
            }
        }
    }
}
