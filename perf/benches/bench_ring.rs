use basalt_events::QuoteTick;
use basalt_icc::SpscRing;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_write_read_pair(c: &mut Criterion) {
    let ring = SpscRing::new_boxed();
    let tick = QuoteTick::new("RELIANCE", 2850.25, 2850.75, 1_234_567_890_123);
    let mut out = QuoteTick::default();

    c.bench_function("SpscRing try_write + try_read", |b| {
        b.iter(|| {
            black_box(ring.try_write(black_box(&tick)));
            black_box(ring.try_read(&mut out));
        });
    });
}

fn bench_write_until_full(c: &mut Criterion) {
    let tick = QuoteTick::new("RELIANCE", 2850.25, 2850.75, 1_234_567_890_123);

    c.bench_function("SpscRing fill 1023 slots", |b| {
        b.iter_with_setup(SpscRing::new_boxed, |ring| {
            while ring.try_write(black_box(&tick)) {}
            black_box(ring.available_for_read());
        });
    });
}

criterion_group!(benches, bench_write_read_pair, bench_write_until_full);
criterion_main!(benches);
