//! Frontier sweep benchmarks.

use std::hint::black_box;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use ndarray::Array1;
use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use verdant_data::EsgScores;
use verdant_optimize::FrontierSweeper;
use verdant_optimize::OptimizerConfig;
use verdant_risk::ConditioningConfig;
use verdant_risk::CovarianceMatrix;
use verdant_risk::ExcessReturnStats;

fn universe(n: usize) -> (ExcessReturnStats, EsgScores) {
    let mut rng = StdRng::seed_from_u64(7);
    let assets: Vec<String> = (0..n).map(|i| format!("A{i:03}")).collect();
    let k = n + 10;
    let b = Array2::from_shape_fn((k, n), |_| rng.gen_range(-0.02..0.02));
    let mut cov = b.t().dot(&b) / k as f64;
    for i in 0..n {
        cov[[i, i]] += 1e-4;
    }
    let mean = Array1::from_shape_fn(n, |_| rng.gen_range(-0.0005..0.0015));
    let matrix = CovarianceMatrix::from_raw(assets.clone(), &cov, &ConditioningConfig::default())
        .expect("random covariance conditions");
    let stats = ExcessReturnStats::from_parts(mean, matrix).expect("matching dimensions");
    let esg = EsgScores::new(
        assets
            .into_iter()
            .map(|a| (a, rng.gen_range(0.1..0.9))),
    )
    .expect("scores in range");
    (stats, esg)
}

fn bench_frontier(c: &mut Criterion) {
    let mut group = c.benchmark_group("frontier_sweep");
    let sweeper = FrontierSweeper::new(OptimizerConfig {
        min_allocation: 0.0,
        frontier_step: 0.02,
        ..OptimizerConfig::default()
    });

    for n in [5usize, 10, 25] {
        let (stats, esg) = universe(n);
        group.bench_with_input(BenchmarkId::new("points", n), &n, |b, _| {
            b.iter(|| black_box(sweeper.points(&stats, &esg).expect("sweep")))
        });
    }
    group.finish();
}

fn bench_tangency(c: &mut Criterion) {
    let sweeper = FrontierSweeper::new(OptimizerConfig::default());
    let (stats, _) = universe(25);
    c.bench_function("tangency_25", |b| {
        b.iter(|| black_box(sweeper.optimizer().max_sharpe_unconstrained(&stats)))
    });
}

criterion_group!(benches, bench_frontier, bench_tangency);
criterion_main!(benches);
