//! Common fixtures for integration tests
//!
//! - `PulseTrain`: drives a meter through phases of constant flow on a
//!   manual clock, injecting sensor edges the way the interrupt would
//! - Phase shorthands for the reference sensor

#![allow(dead_code)]

use flowguard_core::{
    time::{ManualClock, TimeSource, Timestamp},
    CycleReport, DurableStore, FlowMeter, PulseAccumulator, Transport,
};

/// YF-S201: 15 pulses/s is 2 L/s, i.e. 120 L/min
pub const PULSES_PER_SECOND_120_LPM: f64 = 15.0;

/// One stretch of constant flow
#[derive(Debug, Clone, Copy)]
pub struct Phase {
    /// How long the phase lasts
    pub duration_ms: u64,
    /// Edge frequency during the phase
    pub pulses_per_second: f64,
}

impl Phase {
    /// Constant flow for `duration_ms`
    pub fn flow(duration_ms: u64, pulses_per_second: f64) -> Self {
        Self {
            duration_ms,
            pulses_per_second,
        }
    }

    /// No flow for `duration_ms`
    pub fn idle(duration_ms: u64) -> Self {
        Self::flow(duration_ms, 0.0)
    }
}

/// Sensor edge generator plus main-loop driver
pub struct PulseTrain<'a> {
    pulses: &'a PulseAccumulator,
    clock: ManualClock,
    step_ms: u64,
    carry: f64,
    emitted: u64,
}

impl<'a> PulseTrain<'a> {
    /// Train starting at `start`, running the cycle every `step_ms`
    pub fn new(pulses: &'a PulseAccumulator, start: Timestamp, step_ms: u64) -> Self {
        Self {
            pulses,
            clock: ManualClock::new(start),
            step_ms,
            carry: 0.0,
            emitted: 0,
        }
    }

    /// Current simulated time
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Edges injected so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Advance through `phase`, cycling the meter every step
    pub fn run<S: DurableStore, T: Transport>(
        &mut self,
        meter: &mut FlowMeter<'_, S, T>,
        phase: Phase,
    ) -> Vec<CycleReport> {
        let steps = phase.duration_ms / self.step_ms;
        let per_step = phase.pulses_per_second * self.step_ms as f64 / 1000.0;
        let mut reports = Vec::with_capacity(steps as usize);

        for _ in 0..steps {
            self.clock.advance(self.step_ms);
            let now = self.clock.now();

            let due = self.carry + per_step;
            let whole = due.floor();
            self.carry = due - whole;
            for _ in 0..whole as u64 {
                self.pulses.record_event(now);
            }
            self.emitted += whole as u64;

            reports.push(meter.cycle_with(&self.clock));
        }
        reports
    }

    /// Run several phases back to back
    pub fn run_all<S: DurableStore, T: Transport>(
        &mut self,
        meter: &mut FlowMeter<'_, S, T>,
        phases: &[Phase],
    ) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        for phase in phases {
            reports.extend(self.run(meter, *phase));
        }
        reports
    }
}

/// Approximate float comparison for volumes
pub fn assert_litres(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected} L, got {actual} L"
    );
}
