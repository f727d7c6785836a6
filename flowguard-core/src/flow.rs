//! Flow rate estimation from pulse deltas
//!
//! Once per calculation window the estimator compares the current pulse count
//! with the count it saw last time:
//!
//! ```text
//! delta > 0   →  rate   = delta / calibration × rate_scale
//!                volume = delta / calibration
//! delta == 0  →  rate unchanged, unless the last pulse is older than the
//!                idle timeout, in which case rate = 0
//! ```
//!
//! Holding the rate through short gaps matters at low flow: at 1 L/min a
//! YF-S201 produces one pulse every 8 seconds, so most one-second windows
//! are empty even though water is running.

use crate::config::FlowConfig;
use crate::pulse::PulseSnapshot;
use crate::time::{elapsed_ms, Timestamp};

/// Volume represented by `pulses` (litres)
#[inline]
pub fn pulses_to_volume(pulses: u32, calibration_factor: f32) -> f64 {
    pulses as f64 / calibration_factor as f64
}

/// Rate for `pulses` counted in one window, in rate units per window scale
#[inline]
pub fn pulses_to_rate(pulses: u32, calibration_factor: f32, rate_scale: f32) -> f32 {
    (pulses as f32 / calibration_factor) * rate_scale
}

/// Output of one estimator tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlowSample {
    /// Instantaneous rate for the window just completed (L/min by default)
    pub rate: f32,
    /// Volume added in this window (litres)
    pub volume_increment: f64,
    /// Cumulative volume; filled in by the volume accumulator
    pub volume_total: f64,
    /// Pulses counted in this window
    pub pulses: u32,
    /// Rate was forced to zero by the idle timeout
    pub idle: bool,
    /// When the window closed
    pub timestamp: Timestamp,
}

/// Converts pulse counts into a rate, owning the previous-count memory
#[derive(Debug, Clone)]
pub struct FlowEstimator {
    calibration_factor: f32,
    rate_scale: f32,
    calc_interval_ms: u64,
    idle_timeout_ms: u64,
    /// Count at the previous tick; `None` until the first tick
    previous: Option<PulseSnapshot>,
    last_tick: Option<Timestamp>,
    rate: f32,
}

impl FlowEstimator {
    /// Estimator for a validated `FlowConfig`
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            calibration_factor: config.calibration_factor,
            rate_scale: config.rate_scale(),
            calc_interval_ms: config.calc_interval_ms,
            idle_timeout_ms: config.idle_timeout_ms,
            previous: None,
            last_tick: None,
            rate: 0.0,
        }
    }

    /// Current rate estimate
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Tick if a full calculation window has passed since the last one
    ///
    /// The first call always ticks, to capture the baseline count.
    pub fn poll(&mut self, now: Timestamp, snapshot: PulseSnapshot) -> Option<FlowSample> {
        match self.last_tick {
            Some(last) if elapsed_ms(last, now) < self.calc_interval_ms => None,
            _ => Some(self.tick(now, snapshot)),
        }
    }

    /// Close a window at `now` and estimate rate and volume
    ///
    /// The first tick only records the baseline: whatever the counter held
    /// before the estimator existed is not flow in this window.
    pub fn tick(&mut self, now: Timestamp, snapshot: PulseSnapshot) -> FlowSample {
        let pulses = match &self.previous {
            Some(previous) => snapshot.pulses_since(previous),
            None => 0,
        };
        self.previous = Some(snapshot);
        self.last_tick = Some(now);

        let mut idle = false;
        let mut volume_increment = 0.0;

        if pulses > 0 {
            self.rate = pulses_to_rate(pulses, self.calibration_factor, self.rate_scale);
            volume_increment = pulses_to_volume(pulses, self.calibration_factor);
            log_debug!("Flow: {} pulses, rate {} L/min", pulses, self.rate);
        } else if snapshot.ms_since_last_pulse(now) > self.idle_timeout_ms {
            if self.rate > 0.0 {
                log_info!("Flow stopped after {} ms without pulses", self.idle_timeout_ms);
            }
            self.rate = 0.0;
            idle = true;
        }

        FlowSample {
            rate: self.rate,
            volume_increment,
            volume_total: 0.0,
            pulses,
            idle,
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(count: u32, last_pulse_tick: u32) -> PulseSnapshot {
        PulseSnapshot { count, last_pulse_tick }
    }

    fn estimator() -> FlowEstimator {
        FlowEstimator::new(&FlowConfig::default())
    }

    #[test]
    fn conversion_helpers() {
        // 7.5 pulses per litre: 75 pulses is 10 L
        assert!((pulses_to_volume(75, 7.5) - 10.0).abs() < 1e-9);
        // 15 pulses in one second at 7.5 pulses/L is 2 L/s = 120 L/min
        assert!((pulses_to_rate(15, 7.5, 60.0) - 120.0).abs() < 1e-4);
        assert_eq!(pulses_to_rate(0, 7.5, 60.0), 0.0);
    }

    #[test]
    fn first_tick_is_baseline_only() {
        let mut est = estimator();
        // Counter already holds pulses from before the estimator started
        let sample = est.tick(1000, snapshot(12_345, 990));
        assert_eq!(sample.pulses, 0);
        assert_eq!(sample.volume_increment, 0.0);
        assert_eq!(sample.rate, 0.0);
    }

    #[test]
    fn rate_from_delta() {
        let mut est = estimator();
        est.tick(0, snapshot(0, 0));

        let sample = est.tick(1000, snapshot(15, 990));
        assert_eq!(sample.pulses, 15);
        assert!((sample.rate - 120.0).abs() < 1e-4);
        assert!((sample.volume_increment - 2.0).abs() < 1e-9);
        assert!(!sample.idle);
    }

    #[test]
    fn two_second_window_at_calibration_7_5() {
        let config = FlowConfig { calc_interval_ms: 2000, ..FlowConfig::default() };
        assert_eq!(config.rate_scale(), 30.0);
        let mut est = FlowEstimator::new(&config);
        est.tick(0, snapshot(0, 0));

        // 37.5 pulses/s is 5 L/s
        let sample = est.tick(2000, snapshot(75, 1990));
        assert_eq!(sample.pulses, 75);
        assert_eq!(sample.rate, 300.0);
        assert_eq!(sample.volume_increment, 10.0);
        assert_eq!(pulses_to_rate(75, 7.5, 30.0), 300.0);

        // 7.5 pulses/s is 1 L/s
        let sample = est.tick(4000, snapshot(90, 3990));
        assert_eq!(sample.pulses, 15);
        assert_eq!(sample.rate, 60.0);
        assert_eq!(sample.volume_increment, 2.0);
        assert_eq!(pulses_to_rate(15, 7.5, 30.0), 60.0);
    }

    #[test]
    fn rate_held_through_short_gaps() {
        let mut est = estimator();
        est.tick(0, snapshot(0, 0));
        let flowing = est.tick(1000, snapshot(1, 900)).rate;
        assert!(flowing > 0.0);

        // No pulses for 3 s: still inside the 5 s idle timeout
        let sample = est.tick(4000, snapshot(1, 900));
        assert_eq!(sample.pulses, 0);
        assert_eq!(sample.rate, flowing);
        assert_eq!(sample.volume_increment, 0.0);
        assert!(!sample.idle);
    }

    #[test]
    fn idle_timeout_forces_zero() {
        let mut est = estimator();
        est.tick(0, snapshot(0, 0));
        est.tick(1000, snapshot(40, 1000));

        let sample = est.tick(7000, snapshot(40, 1000));
        assert_eq!(sample.rate, 0.0);
        assert!(sample.idle);
        assert_eq!(est.rate(), 0.0);
    }

    #[test]
    fn poll_respects_interval() {
        let mut est = estimator();
        assert!(est.poll(0, snapshot(0, 0)).is_some());
        assert!(est.poll(999, snapshot(5, 900)).is_none());

        let sample = est.poll(1000, snapshot(5, 900)).unwrap();
        assert_eq!(sample.pulses, 5);
    }

    #[test]
    fn wrapped_counter_gives_small_delta() {
        let mut est = estimator();
        est.tick(0, snapshot(u32::MAX - 2, 0));
        let sample = est.tick(1000, snapshot(4, 1000));
        assert_eq!(sample.pulses, 7);
    }
}
