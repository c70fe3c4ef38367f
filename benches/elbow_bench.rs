use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kinsight::elbow::{compute_elbow, ElbowResult};
use kinsight::KMeansDefaults;
use ndarray::Array2;
use rand::prelude::*;

fn generate_survey_data(n_samples: usize, n_features: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    Array2::from_shape_fn((n_samples, n_features), |_| rng.gen_range(1..=5) as f64)
}

fn bench_elbow_sweep(c: &mut Criterion) {
    let defaults = KMeansDefaults {
        n_init: 3,
        ..KMeansDefaults::default()
    };

    let mut group = c.benchmark_group("elbow_sweep");
    group.sample_size(10);

    for &n_samples in &[100, 400] {
        let data = generate_survey_data(n_samples, 6);
        group.bench_with_input(BenchmarkId::from_parameter(n_samples), &data, |b, data| {
            b.iter(|| black_box(compute_elbow(black_box(data.view()), 2, 10, &defaults).unwrap()));
        });
    }

    group.finish();
}

fn bench_heuristics(c: &mut Criterion) {
    let ks: Vec<usize> = (2..=30).collect();
    let wcss: Vec<f64> = ks.iter().map(|&k| 1000.0 / k as f64 + 5.0).collect();

    c.bench_function("elbow_heuristics", |b| {
        b.iter(|| black_box(ElbowResult::from_curve(ks.clone(), wcss.clone())))
    });
}

criterion_group!(benches, bench_elbow_sweep, bench_heuristics);
criterion_main!(benches);
