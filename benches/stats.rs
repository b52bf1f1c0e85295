//! Criterion benchmarks of the statistics kernels.

use criterion::{criterion_group, criterion_main, Criterion};
use microbench::{compare_samples, Stats};
use std::hint::black_box;

fn bench_stats_push(c: &mut Criterion) {
    c.bench_function("stats_push_100", |b| {
        b.iter(|| {
            let mut stats = Stats::default();
            for i in 0..100 {
                stats.push(black_box(1e-6 + i as f64 * 1e-9));
            }
            black_box(stats.moe)
        })
    });
}

fn bench_recompute(c: &mut Criterion) {
    let mut stats = Stats::default();
    for i in 0..1000 {
        stats.sample.push(1e-6 + (i % 13) as f64 * 1e-9);
    }
    c.bench_function("stats_recompute_1k", |b| {
        b.iter(|| {
            let mut s = stats.clone();
            s.recompute();
            black_box(s.rme)
        })
    });
}

fn bench_compare(c: &mut Criterion) {
    let a: Vec<f64> = (0..30).map(|i| 1e-6 + (i % 7) as f64 * 1e-9).collect();
    let b_sample: Vec<f64> = (0..30).map(|i| 2e-6 + (i % 5) as f64 * 1e-9).collect();
    c.bench_function("compare_samples_30x30", |b| {
        b.iter(|| black_box(compare_samples(black_box(&a), black_box(&b_sample))))
    });
}

criterion_group!(benches, bench_stats_push, bench_recompute, bench_compare);
criterion_main!(benches);
