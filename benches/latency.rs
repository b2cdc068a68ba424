//! Benchmarks for latency sampling, hedging and comparison

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reliability_lab::{
    analyze, compare, HedgePolicy, HedgingSimulator, LatencyModel, ProfileRegistry, Seed,
};

fn benchmark_latency_sampling(c: &mut Criterion) {
    let registry = ProfileRegistry::builtin();
    let model = LatencyModel::new(&registry);
    let mut group = c.benchmark_group("latency");

    for count in &[1_000, 10_000, 100_000] {
        group.bench_function(format!("simulate_and_analyze_{count}"), |b| {
            b.iter(|| {
                let mut rng = Seed::new(42).rng();
                let samples = model
                    .simulate_batch("medium", black_box(*count), &mut rng)
                    .unwrap_or_default();
                analyze(&samples)
            });
        });
    }

    group.finish();
}

fn benchmark_hedging(c: &mut Criterion) {
    let registry = ProfileRegistry::builtin();
    let hedging = HedgingSimulator::new(LatencyModel::new(&registry));

    c.bench_function("hedge_evaluate_p95_10000", |b| {
        b.iter(|| {
            let mut rng = Seed::new(42).rng();
            hedging.evaluate(
                "slow",
                HedgePolicy::Percentile { quantile: 0.95 },
                black_box(10_000),
                &mut rng,
            )
        });
    });
}

fn benchmark_compare(c: &mut Criterion) {
    let registry = ProfileRegistry::builtin();
    let model = LatencyModel::new(&registry);
    let a = model
        .simulate_batch("fast", 5_000, &mut Seed::new(1).rng())
        .unwrap_or_default();
    let b = model
        .simulate_batch("medium", 5_000, &mut Seed::new(2).rng())
        .unwrap_or_default();

    c.bench_function("compare_5000_vs_5000", |bench| {
        bench.iter(|| compare(black_box(&a), black_box(&b)));
    });
}

criterion_group!(
    benches,
    benchmark_latency_sampling,
    benchmark_hedging,
    benchmark_compare
);
criterion_main!(benches);
