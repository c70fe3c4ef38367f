use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kinsight::{davies_bouldin, silhouette_score, InitMethod, KMeans};
use ndarray::Array2;
use rand::prelude::*;

/// Likert-style answers (1-5) around `n_groups` respondent profiles
fn generate_survey_data(n_samples: usize, n_features: usize, n_groups: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    let profiles: Vec<Vec<f64>> = (0..n_groups)
        .map(|_| (0..n_features).map(|_| rng.gen_range(1..=5) as f64).collect())
        .collect();

    Array2::from_shape_fn((n_samples, n_features), |(i, j)| {
        let centre = profiles[i % n_groups][j];
        (centre + rng.gen_range(-1.0..1.0)).clamp(1.0, 5.0)
    })
}

fn bench_kmeans_small(c: &mut Criterion) {
    let data = generate_survey_data(100, 5, 3);

    let mut group = c.benchmark_group("kmeans_small");

    for &n_clusters in &[2, 5, 10] {
        for (name, method) in [("kmeans_pp", InitMethod::KMeansPlusPlus), ("random", InitMethod::Random)] {
            group.bench_with_input(BenchmarkId::new(name, n_clusters), &n_clusters, |b, &k| {
                let kmeans = KMeans::new(k)
                    .init_method(method)
                    .random_state(42)
                    .n_init(1)
                    .max_iter(100);

                b.iter(|| black_box(kmeans.fit(black_box(data.view())).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_n_init_effect(c: &mut Criterion) {
    let data = generate_survey_data(500, 8, 4);

    let mut group = c.benchmark_group("n_init_effect");
    group.sample_size(20);

    for &n_init in &[1, 5, 10] {
        for (name, jobs) in [("parallel", None), ("sequential", Some(1))] {
            group.bench_with_input(BenchmarkId::new(name, n_init), &n_init, |b, &n_init| {
                let mut kmeans = KMeans::new(4).random_state(42).n_init(n_init).max_iter(100);
                if let Some(jobs) = jobs {
                    kmeans = kmeans.n_jobs(jobs);
                }

                b.iter(|| black_box(kmeans.fit(black_box(data.view())).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    group.sample_size(20);

    for &n_samples in &[100, 500] {
        let data = generate_survey_data(n_samples, 5, 3);
        let labels = KMeans::new(3)
            .random_state(42)
            .fit(data.view())
            .unwrap()
            .labels
            .to_vec();

        group.bench_with_input(BenchmarkId::new("silhouette", n_samples), &data, |b, data| {
            b.iter(|| black_box(silhouette_score(black_box(data.view()), &labels)));
        });
        group.bench_with_input(BenchmarkId::new("davies_bouldin", n_samples), &data, |b, data| {
            b.iter(|| black_box(davies_bouldin(black_box(data.view()), &labels).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kmeans_small, bench_n_init_effect, bench_metrics);
criterion_main!(benches);
