use basalt_clock::CoarseClock;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::SystemTime;

fn bench_coarse_now(c: &mut Criterion) {
    let clock = CoarseClock::start().expect("clock");
    c.bench_function("CoarseClock::now", |b| {
        b.iter(|| black_box(clock.now()));
    });
}

fn bench_system_clock(c: &mut Criterion) {
    c.bench_function("SystemTime::now (reference)", |b| {
        b.iter(|| black_box(SystemTime::now()));
    });
}

criterion_group!(benches, bench_coarse_now, bench_system_clock);
criterion_main!(benches);
