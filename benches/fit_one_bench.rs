//! Benchmark for per-example model updates
//!
//! Measures one `fit_one` call on models that have already seen their key space, so
//! the numbers reflect steady-state updates rather than key registration.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use streamlearn::base::{Classifier, Features, Regressor};
use streamlearn::ensemble::{BaggingConfig, BaggingRegressor};
use streamlearn::linear_model::{LinearRegression, SoftmaxRegression};
use streamlearn::reco::{Baseline, BaselineConfig, BiasedMF, BiasedMfConfig, Recommender};

fn feature_rows() -> Vec<Features<u32>> {
    (0..100u32)
        .map(|row| (0..20u32).map(|i| ((row * 7 + i) % 500, 1.0 / (i + 1) as f64)).collect())
        .collect()
}

/// Benchmark: LinearRegression::fit_one with 20 active features
fn bench_linear_regression(c: &mut Criterion) {
    let rows = feature_rows();
    let mut model: LinearRegression<u32> = LinearRegression::default();
    for x in &rows {
        model.fit_one(x, 1.0);
    }

    let mut i = 0;
    c.bench_function("linear_regression_fit_one", |b| {
        b.iter(|| {
            model.fit_one(black_box(&rows[i % rows.len()]), 1.0);
            i += 1;
        })
    });
}

/// Benchmark: SoftmaxRegression::fit_one with 5 labels
fn bench_softmax(c: &mut Criterion) {
    let rows = feature_rows();
    let mut model: SoftmaxRegression<u32, u8> = SoftmaxRegression::default();
    for (i, x) in rows.iter().enumerate() {
        model.fit_one(x, &((i % 5) as u8));
    }

    let mut i = 0;
    c.bench_function("softmax_fit_one", |b| {
        b.iter(|| {
            model.fit_one(black_box(&rows[i % rows.len()]), &((i % 5) as u8));
            i += 1;
        })
    });
}

/// Benchmark: recommenders on a 100 x 100 rating grid
fn bench_recommenders(c: &mut Criterion) {
    let mut baseline: Baseline<u32, u32> = Baseline::new(BaselineConfig::default()).unwrap();
    let mut mf: BiasedMF<u32, u32> = BiasedMF::new(BiasedMfConfig {
        seed: Some(42),
        ..Default::default()
    })
    .unwrap();
    for user in 0..100u32 {
        for item in 0..100u32 {
            let y = ((user + item) % 5) as f64;
            baseline.fit_one(&user, &item, y);
            mf.fit_one(&user, &item, y);
        }
    }

    let mut group = c.benchmark_group("recommender_fit_one");
    let mut i = 0u32;
    group.bench_function("baseline", |b| {
        b.iter(|| {
            baseline.fit_one(black_box(&(i % 100)), black_box(&(i % 97)), 3.0);
            i += 1;
        })
    });
    group.bench_function("biased_mf", |b| {
        b.iter(|| {
            mf.fit_one(black_box(&(i % 100)), black_box(&(i % 97)), 3.0);
            i += 1;
        })
    });
    group.finish();
}

/// Benchmark: online bagging with 10 replicas
fn bench_bagging(c: &mut Criterion) {
    let rows = feature_rows();
    let mut model = BaggingRegressor::new(
        LinearRegression::<u32>::default(),
        BaggingConfig {
            n_models: 10,
            seed: Some(1),
        },
    )
    .unwrap();

    let mut i = 0;
    c.bench_function("bagging_regressor_fit_one", |b| {
        b.iter(|| {
            model.fit_one(black_box(&rows[i % rows.len()]), 1.0);
            i += 1;
        })
    });
}

criterion_group!(
    benches,
    bench_linear_regression,
    bench_softmax,
    bench_recommenders,
    bench_bagging
);
criterion_main!(benches);
