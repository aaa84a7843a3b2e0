//! Criterion benchmarks for one input-poller frame.
//!
//! A frame runs every 16 ms, so a tick over a handful of standard gamepads
//! (17 buttons, 4 axes) must stay far below that.
//!
//! Run with:
//! ```bash
//! cargo bench --package wall-core --bench poller_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wall_core::{DeviceId, DeviceSample, GamepadMapping, InputPoller};

fn standard_pad(pressed: Option<usize>, x: f32) -> DeviceSample {
    DeviceSample::new(
        (0..17).map(|i| Some(i) == pressed).collect(),
        vec![x, 0.0, 0.0, 0.0],
    )
}

fn poller_with(devices: u32) -> InputPoller {
    let mut poller = InputPoller::new();
    let mapping = GamepadMapping::standard();
    poller.add_listener(move |change| {
        black_box(mapping.transitions(change));
    });
    for d in 0..devices {
        poller.device_connected(DeviceId(d), standard_pad(None, 0.0));
    }
    poller
}

/// Every device unchanged: pure diffing cost.
fn bench_tick_idle_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_unchanged");
    for devices in [1u32, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(devices), &devices, |b, &n| {
            let mut poller = poller_with(n);
            b.iter(|| poller.tick(|_| Some(standard_pad(None, 0.0))))
        });
    }
    group.finish();
}

/// Every device changes every frame: diffing plus listener fan-out.
fn bench_tick_changing_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_changing");
    for devices in [1u32, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(devices), &devices, |b, &n| {
            let mut poller = poller_with(n);
            let mut frame = 0usize;
            b.iter(|| {
                frame += 1;
                let pressed = Some(frame % 17);
                let x = if frame % 2 == 0 { 0.9 } else { -0.9 };
                poller.tick(|_| Some(standard_pad(pressed, x)))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tick_idle_input, bench_tick_changing_input);
criterion_main!(benches);
