//! Criterion benchmarks for a full GPU frame: record, submit, tick, readback.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pulse_bench::{cpu_profile, gpu_profile};
use pulse_core::QueueId;
use pulse_engine::Profiler;

const REGIONS: u32 = 8;
const FRAME_LATENCY: u32 = 2;

fn gpu_frame(c: &mut Criterion) {
    let (config, probe) = gpu_profile(64);
    let profiler = Profiler::new(config).expect("valid profile");
    // Keep the fence far ahead so generation reuse never blocks, and give
    // every slot a nonzero timestamp so readback takes the resolved path.
    probe.signal(u64::MAX);
    for generation in 0..FRAME_LATENCY {
        for slot in 0..REGIONS * 2 {
            probe.write_slot(generation, slot, u64::from(slot + 1) * 100);
        }
    }

    c.bench_function("gpu_frame_8_regions", |b| {
        b.iter(|| {
            let mut list = profiler.list_recorder(QueueId(0));
            for _ in 0..REGIONS {
                let _ = list.begin(black_box("Pass"));
            }
            for _ in 0..REGIONS {
                let _ = list.end();
            }
            profiler.execute_command_lists(QueueId(0), vec![list]);
            profiler.tick();
        })
    });
}

fn empty_tick(c: &mut Criterion) {
    let profiler = Profiler::new(cpu_profile(64)).expect("valid profile");
    c.bench_function("empty_tick", |b| b.iter(|| profiler.tick()));
}

criterion_group!(benches, gpu_frame, empty_tick);
criterion_main!(benches);
