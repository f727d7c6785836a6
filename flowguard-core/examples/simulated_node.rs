//! Simulated Flow Meter Node
//!
//! Runs the full node on a host: a background thread plays the sensor's
//! edge interrupt, the main thread runs the polling cycle against a
//! file-backed store and an in-memory transport.
//!
//! Run it twice to watch the volume and boot count carry over.
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example simulated_node
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use flowguard_core::{
    battery::AuxSensor,
    config::BatteryConfig,
    storage::FileStore,
    time::{MonotonicClock, TimeSource},
    transport::LoopbackTransport,
    FlowMeter, MeterConfig, PulseAccumulator, ReportOutcome,
};

static PULSES: PulseAccumulator = PulseAccumulator::new();
static RUNNING: AtomicBool = AtomicBool::new(true);

/// Cell that loses 10 mV at the pin per reading batch
struct DrainingCell {
    millivolts: u16,
    reads: u32,
}

impl AuxSensor for DrainingCell {
    type Error = ();

    fn read_millivolts(&mut self) -> nb::Result<u16, ()> {
        self.reads += 1;
        if self.reads % 16 == 0 {
            self.millivolts = self.millivolts.saturating_sub(10);
        }
        Ok(self.millivolts)
    }
}

fn main() {
    println!("FlowGuard Simulated Node");
    println!("========================\n");

    let state_dir = std::env::temp_dir().join("flowguard-sim");
    println!("State directory: {}\n", state_dir.display());

    let clock = MonotonicClock::new();
    let config = MeterConfig::default().with_battery(BatteryConfig {
        check_interval_ms: 2_000,
        ..BatteryConfig::default()
    });

    let mut meter = FlowMeter::start(
        config,
        &PULSES,
        FileStore::new(&state_dir),
        LoopbackTransport::<32>::connected(),
        clock.now(),
    )
    .expect("default configuration is valid");

    let status = meter.status(clock.now());
    println!("Started: {}\n", status);

    // Sensor: 3 s at ~120 L/min, 6 s still, 3 s at ~30 L/min
    let sensor_clock = clock.clone();
    let sensor = thread::spawn(move || {
        let profile = [(3_000u64, 15u64), (6_000, 0), (3_000, 4)];
        for (duration_ms, pulses_per_second) in profile {
            let start = sensor_clock.now();
            while sensor_clock.now() - start < duration_ms {
                if pulses_per_second == 0 {
                    thread::sleep(Duration::from_millis(50));
                    continue;
                }
                PULSES.record_event(sensor_clock.now());
                thread::sleep(Duration::from_millis(1000 / pulses_per_second));
            }
        }
        RUNNING.store(false, Ordering::Release);
    });

    let mut cell = DrainingCell { millivolts: 2000, reads: 0 };
    let mut last_print = clock.now();

    while RUNNING.load(Ordering::Acquire) {
        let now = clock.now();
        meter.poll_battery(now, &mut cell);
        let cycle = meter.cycle(now);

        if let ReportOutcome::Delivered(reason) = cycle.report {
            if let Some(report) = meter.transport().last() {
                println!(
                    "[{:>6} ms] report ({}): {:.1} L/min, {:.3} L, battery {:?}",
                    now,
                    reason.as_str(),
                    report.rate,
                    report.volume_total,
                    report.aux
                );
            }
        }
        if cycle.saved {
            println!("[{:>6} ms] saved {:.3} L", now, meter.volume_total());
        }
        if now - last_print >= 2_000 {
            println!("[{:>6} ms] {}", now, meter.status(now));
            last_print = now;
        }

        thread::sleep(Duration::from_millis(10));
    }

    sensor.join().expect("sensor thread panicked");

    let now = clock.now();
    match meter.flush(now) {
        Ok(()) => println!("\nFinal state saved."),
        Err(e) => println!("\nFinal save failed: {}", e),
    }
    println!("Final: {}", meter.status(now));
    println!("Reports delivered: {}", meter.transport().delivered().len());
}
