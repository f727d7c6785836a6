//! Cost of the hot paths: the edge handler and one polling cycle

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use flowguard_core::{
    storage::{DurableRecord, MemoryStore},
    transport::LoopbackTransport,
    FlowMeter, MeterConfig, PulseAccumulator,
};

fn bench_record_event(c: &mut Criterion) {
    let pulses = PulseAccumulator::new();
    let mut now = 0u64;
    c.bench_function("record_event", |b| {
        b.iter(|| {
            now += 1;
            pulses.record_event(black_box(now));
        })
    });
}

fn bench_cycle(c: &mut Criterion) {
    let pulses = PulseAccumulator::new();
    let mut meter = FlowMeter::start(
        MeterConfig::default(),
        &pulses,
        MemoryStore::<1>::new(),
        LoopbackTransport::<8>::connected(),
        0,
    )
    .unwrap();

    // 10 ms loop period, 15 pulses per second
    let mut now = 0u64;
    c.bench_function("cycle", |b| {
        b.iter(|| {
            now += 10;
            if now % 70 == 0 {
                pulses.record_event(now);
            }
            black_box(meter.cycle(now))
        })
    });
}

fn bench_codec(c: &mut Criterion) {
    let record = DurableRecord { volume_total: 1234.5, pulse_count: 9_259, boot_count: 17 };
    c.bench_function("record_encode_decode", |b| {
        b.iter(|| DurableRecord::decode(&black_box(record).encode()))
    });
}

criterion_group!(benches, bench_record_event, bench_cycle, bench_codec);
criterion_main!(benches);
