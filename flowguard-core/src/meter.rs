//! The polling cycle
//!
//! ## Overview
//!
//! `FlowMeter` owns every piece of node state except the pulse counter, which
//! it only borrows: the edge interrupt keeps writing to that while the cycle
//! runs. One call to `cycle` does, in order:
//!
//! ```text
//! snapshot pulses ─→ estimate rate ─→ accumulate volume ─→ maybe save ─→ maybe report
//!   (atomic read)    (once per window)                     (wear-aware)   (if connected)
//! ```
//!
//! ## Failure Model
//!
//! `cycle` cannot fail. Storage and transport errors are logged and the
//! affected step is retried on a later cycle; `CycleReport` says what
//! happened for callers that care.
//!
//! ## Timing
//!
//! The caller supplies `now` from a monotonic millisecond clock. Calling
//! `cycle` more often than the calculation window is fine (and expected):
//! estimation only runs once per window, the report and save rules are
//! checked every time.

use core::fmt;

use crate::battery::{AuxSensor, BatteryMonitor};
use crate::config::MeterConfig;
use crate::constants::{flow::FLOWING_RATE_THRESHOLD, time::STATUS_LOG_INTERVAL_MS};
use crate::errors::{ConfigError, StorageError};
use crate::flow::{FlowEstimator, FlowSample};
use crate::persist::PersistenceManager;
use crate::pulse::PulseAccumulator;
use crate::report::{ReportOutcome, ReportTrigger};
use crate::storage::DurableStore;
use crate::time::{elapsed_ms, TimeSource, Timestamp};
use crate::transport::Transport;
use crate::volume::VolumeAccumulator;

/// What one cycle did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Estimator output, if a calculation window closed this cycle
    pub sample: Option<FlowSample>,
    /// A save reached durable storage
    pub saved: bool,
    /// What happened on the report path
    pub report: ReportOutcome,
}

/// Point-in-time summary of the node
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeStatus {
    /// Starts, including this one
    pub boot_count: u32,
    /// Time since `start`
    pub uptime_ms: u64,
    /// Current rate (L/min by default)
    pub rate: f32,
    /// Lifetime volume (litres)
    pub volume_total: f64,
    /// Lifetime pulses
    pub pulse_count: u64,
    /// Rate above the "flowing" threshold
    pub flowing: bool,
    /// Transport link is up
    pub connected: bool,
    /// Latest battery estimate, if a battery is monitored
    pub battery_percent: Option<u8>,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "boot #{} | up {} s | {:.2} L/min | {:.3} L | {} pulses | {} | {}",
            self.boot_count,
            self.uptime_ms / 1000,
            self.rate,
            self.volume_total,
            self.pulse_count,
            if self.flowing { "FLOWING" } else { "IDLE" },
            if self.connected { "CONNECTED" } else { "DISCONNECTED" },
        )?;
        if let Some(percent) = self.battery_percent {
            write!(f, " | battery {}%", percent)?;
        }
        Ok(())
    }
}

/// A running flow-meter node
///
/// - `S`: durable store for the volume record
/// - `T`: transport to the collector
pub struct FlowMeter<'a, S, T> {
    pulses: &'a PulseAccumulator,
    estimator: FlowEstimator,
    volume: VolumeAccumulator,
    trigger: ReportTrigger,
    persistence: PersistenceManager<S>,
    transport: T,
    battery: Option<BatteryMonitor>,
    aux: Option<u8>,
    lifetime_pulses: u64,
    boot_time: Timestamp,
    last_status_log: Timestamp,
}

impl<'a, S: DurableStore, T: Transport> FlowMeter<'a, S, T> {
    /// Validate `config`, restore durable state and take the pulse baseline
    ///
    /// Only configuration errors are fatal. A missing or corrupt record is a
    /// cold start.
    pub fn start(
        config: MeterConfig,
        pulses: &'a PulseAccumulator,
        store: S,
        transport: T,
        now: Timestamp,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut persistence = PersistenceManager::new(&config.persist, store);
        let record = persistence.load(now);

        let mut estimator = FlowEstimator::new(&config.flow);
        // Pulses counted before this point belong to no window
        estimator.tick(now, pulses.snapshot());

        log_info!(
            "Flow meter started: {} pulses/L, report every {} ms",
            config.flow.calibration_factor,
            config.report.interval_ms
        );

        Ok(Self {
            pulses,
            estimator,
            volume: VolumeAccumulator::seeded(record.volume_total),
            trigger: ReportTrigger::new(&config.report, now),
            persistence,
            transport,
            battery: config.battery.as_ref().map(BatteryMonitor::new),
            aux: None,
            lifetime_pulses: record.pulse_count,
            boot_time: now,
            last_status_log: now,
        })
    }

    /// Run one polling cycle at `now`
    pub fn cycle(&mut self, now: Timestamp) -> CycleReport {
        let sample = self
            .estimator
            .poll(now, self.pulses.snapshot())
            .map(|mut sample| {
                sample.volume_total = self.volume.accumulate(sample.volume_increment);
                self.lifetime_pulses = self.lifetime_pulses.wrapping_add(sample.pulses as u64);
                sample
            });

        let saved = self
            .persistence
            .maybe_save(self.volume.total(), self.lifetime_pulses, now);

        let current = sample.unwrap_or_else(|| self.current_sample(now));
        let report = self
            .trigger
            .report(&current, self.aux, now, &mut self.transport);

        if elapsed_ms(self.last_status_log, now) > STATUS_LOG_INTERVAL_MS {
            self.log_status(now);
            self.last_status_log = now;
        }

        CycleReport {
            sample,
            saved,
            report,
        }
    }

    /// Run one cycle at the clock's current time
    pub fn cycle_with<C: TimeSource>(&mut self, clock: &C) -> CycleReport {
        self.cycle(clock.now())
    }

    /// Sample the battery if its interval elapsed and publish the result as
    /// the aux value
    ///
    /// Returns `None` when no battery is configured or nothing has been
    /// sampled yet.
    pub fn poll_battery<A: AuxSensor>(&mut self, now: Timestamp, sensor: &mut A) -> Option<u8> {
        let percent = self.battery.as_mut()?.poll(now, sensor);
        if percent.is_some() {
            self.aux = percent;
        }
        percent
    }

    /// Set the auxiliary value carried in reports
    pub fn update_aux(&mut self, value: u8) {
        self.aux = Some(value);
    }

    /// Save now regardless of the policy, e.g. before a planned power-down
    pub fn flush(&mut self, now: Timestamp) -> Result<(), StorageError> {
        self.persistence
            .save_now(self.volume.total(), self.lifetime_pulses, now)
    }

    /// Snapshot of the node
    pub fn status(&self, now: Timestamp) -> NodeStatus {
        let rate = self.estimator.rate();
        NodeStatus {
            boot_count: self.persistence.boot_count(),
            uptime_ms: elapsed_ms(self.boot_time, now),
            rate,
            volume_total: self.volume.total(),
            pulse_count: self.lifetime_pulses,
            flowing: rate > FLOWING_RATE_THRESHOLD,
            connected: self.transport.is_connected(),
            battery_percent: self.battery.as_ref().and_then(BatteryMonitor::percent),
        }
    }

    /// Current rate estimate
    pub fn rate(&self) -> f32 {
        self.estimator.rate()
    }

    /// Lifetime volume
    pub fn volume_total(&self) -> f64 {
        self.volume.total()
    }

    /// Auxiliary value carried in reports
    pub fn aux(&self) -> Option<u8> {
        self.aux
    }

    /// Report trigger and its baselines
    pub fn trigger(&self) -> &ReportTrigger {
        &self.trigger
    }

    /// Persistence manager
    pub fn persistence(&self) -> &PersistenceManager<S> {
        &self.persistence
    }

    /// Durable store
    pub fn store(&self) -> &S {
        self.persistence.store()
    }

    /// Durable store, mutably
    pub fn store_mut(&mut self) -> &mut S {
        self.persistence.store_mut()
    }

    /// Transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Stop the node and hand back the store and transport
    pub fn into_parts(self) -> (S, T) {
        (self.persistence.into_store(), self.transport)
    }

    fn current_sample(&self, now: Timestamp) -> FlowSample {
        FlowSample {
            rate: self.estimator.rate(),
            volume_increment: 0.0,
            volume_total: self.volume.total(),
            pulses: 0,
            idle: false,
            timestamp: now,
        }
    }

    fn log_status(&self, now: Timestamp) {
        let status = self.status(now);
        log_info!(
            "Status: boot #{}, up {} s, {} L/min, {} L, {} pulses, connected={}",
            status.boot_count,
            status.uptime_ms / 1000,
            status.rate,
            status.volume_total,
            status.pulse_count,
            status.connected
        );
        if let Some(percent) = status.battery_percent {
            log_info!("Status: battery {}%", percent);
        }
    }
}

impl<S, T> fmt::Debug for FlowMeter<'_, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowMeter")
            .field("rate", &self.estimator.rate())
            .field("volume_total", &self.volume.total())
            .field("lifetime_pulses", &self.lifetime_pulses)
            .field("aux", &self.aux)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatteryConfig, MeterConfig};
    use crate::report::ReportReason;
    use crate::storage::{DurableRecord, MemoryStore};
    use crate::transport::LoopbackTransport;

    type Store = MemoryStore<1>;
    type Link = LoopbackTransport<16>;

    fn pulse_burst(pulses: &PulseAccumulator, count: u32, at: Timestamp) {
        for _ in 0..count {
            pulses.record_event(at);
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let pulses = PulseAccumulator::new();
        let mut config = MeterConfig::default();
        config.flow.calibration_factor = 0.0;
        let result = FlowMeter::start(config, &pulses, Store::new(), Link::connected(), 0);
        assert!(matches!(result, Err(ConfigError::InvalidCalibration(_))));
    }

    #[test]
    fn pulses_before_start_are_not_flow() {
        let pulses = PulseAccumulator::new();
        pulse_burst(&pulses, 500, 0);

        let mut meter =
            FlowMeter::start(MeterConfig::default(), &pulses, Store::new(), Link::connected(), 0)
                .unwrap();
        let report = meter.cycle(1000);
        assert_eq!(report.sample.unwrap().pulses, 0);
        assert_eq!(meter.volume_total(), 0.0);
    }

    #[test]
    fn calibration_scenario() {
        // 15 pulses per second at 7.5 pulses/L is 2 L/s = 120 L/min
        let pulses = PulseAccumulator::new();
        let mut meter =
            FlowMeter::start(MeterConfig::default(), &pulses, Store::new(), Link::connected(), 0)
                .unwrap();

        pulse_burst(&pulses, 15, 900);
        meter.cycle(1000);
        pulse_burst(&pulses, 15, 1900);
        let report = meter.cycle(2000);

        let sample = report.sample.unwrap();
        assert!((sample.rate - 120.0).abs() < 1e-3);
        assert!((sample.volume_total - 4.0).abs() < 1e-9);
        assert_eq!(meter.status(2000).pulse_count, 30);
    }

    #[test]
    fn cycle_saves_then_reports() {
        let pulses = PulseAccumulator::new();
        let mut meter =
            FlowMeter::start(MeterConfig::default(), &pulses, Store::new(), Link::connected(), 0)
                .unwrap();

        pulse_burst(&pulses, 15, 900);
        let report = meter.cycle(1000);

        // 2 L crosses the 1 L save threshold; any flow from zero is reported
        assert!(report.saved);
        assert_eq!(report.report, ReportOutcome::Delivered(ReportReason::RateChange));

        let delivered = meter.transport().last().unwrap();
        assert!((delivered.volume_total - 2.0).abs() < 1e-9);

        let mut store = meter.store().clone();
        let record = store.load("flowmeter").unwrap().unwrap();
        assert_eq!(record.pulse_count, 15);
    }

    #[test]
    fn reports_between_windows_use_current_state() {
        let pulses = PulseAccumulator::new();
        let mut meter =
            FlowMeter::start(MeterConfig::default(), &pulses, Store::new(), Link::connected(), 0)
                .unwrap();

        // Between windows nothing is estimated, but the periodic rule still runs
        let report = meter.cycle(30_500);
        assert!(report.sample.is_some());
        let report = meter.cycle(30_600);
        assert!(report.sample.is_none());
        assert_eq!(report.report, ReportOutcome::Quiet);
        let report = meter.cycle(61_000);
        assert_eq!(report.report, ReportOutcome::Delivered(ReportReason::Periodic));
    }

    #[test]
    fn restart_resumes_lifetime_totals() {
        let saved = DurableRecord { volume_total: 12.5, pulse_count: 94, boot_count: 2 };
        let pulses = PulseAccumulator::new();
        let meter = FlowMeter::start(
            MeterConfig::default(),
            &pulses,
            Store::with_record("flowmeter", &saved),
            Link::connected(),
            0,
        )
        .unwrap();

        let status = meter.status(5000);
        assert_eq!(status.boot_count, 3);
        assert_eq!(status.volume_total, 12.5);
        assert_eq!(status.pulse_count, 94);
        assert_eq!(status.uptime_ms, 5000);
        assert!(!status.flowing);
    }

    #[test]
    fn battery_feeds_aux_rule() {
        struct Adc(u16);
        impl AuxSensor for Adc {
            type Error = ();
            fn read_millivolts(&mut self) -> nb::Result<u16, ()> {
                Ok(self.0)
            }
        }

        let pulses = PulseAccumulator::new();
        let config = MeterConfig::default().with_battery(BatteryConfig::default());
        let mut meter =
            FlowMeter::start(config, &pulses, Store::new(), Link::connected(), 0).unwrap();

        // 1.8 V at the pin is 3.6 V at the cell: 50 %, well away from the zero baseline
        assert_eq!(meter.poll_battery(0, &mut Adc(1800)), Some(50));
        let report = meter.cycle(100);
        assert_eq!(report.report, ReportOutcome::Delivered(ReportReason::AuxChange));
        assert_eq!(meter.transport().last().unwrap().aux, Some(50));
        assert_eq!(meter.status(100).battery_percent, Some(50));
    }

    #[test]
    fn no_battery_means_no_aux() {
        let pulses = PulseAccumulator::new();
        let mut meter =
            FlowMeter::start(MeterConfig::default(), &pulses, Store::new(), Link::connected(), 0)
                .unwrap();
        struct Never;
        impl AuxSensor for Never {
            type Error = ();
            fn read_millivolts(&mut self) -> nb::Result<u16, ()> {
                Err(nb::Error::Other(()))
            }
        }
        assert_eq!(meter.poll_battery(0, &mut Never), None);
        assert_eq!(meter.aux(), None);
    }

    #[test]
    fn status_display() {
        let status = NodeStatus {
            boot_count: 3,
            uptime_ms: 125_000,
            rate: 12.0,
            volume_total: 45.125,
            pulse_count: 338,
            flowing: true,
            connected: false,
            battery_percent: Some(80),
        };
        assert_eq!(
            status.to_string(),
            "boot #3 | up 125 s | 12.00 L/min | 45.125 L | 338 pulses | FLOWING | DISCONNECTED | battery 80%"
        );
    }

    #[test]
    fn flush_writes_immediately() {
        let pulses = PulseAccumulator::new();
        let mut meter =
            FlowMeter::start(MeterConfig::default(), &pulses, Store::new(), Link::connected(), 0)
                .unwrap();
        pulse_burst(&pulses, 3, 900);
        meter.cycle(1000);
        let writes = meter.store().writes();

        meter.flush(1001).unwrap();
        assert_eq!(meter.store().writes(), writes + 1);
        let (mut store, _) = meter.into_parts();
        assert_eq!(store.load("flowmeter").unwrap().unwrap().pulse_count, 3);
    }
}
