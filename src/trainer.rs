//! Training a single k-means model on a preprocessed feature matrix

use crate::config::KMeansDefaults;
use crate::error::{Error, Result};
use crate::initialization::InitMethod;
use crate::kmeans::KMeans;
use crate::utils::{cluster_sizes, distinct_labels};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Smallest k a model is trained with; lower requests are raised to this
pub const MIN_CLUSTERS: usize = 2;

/// Hyperparameters for one training call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    /// Requested number of clusters
    pub k: usize,
    /// Centroid seeding strategy
    pub init: InitMethod,
    /// Number of restarts
    pub n_init: usize,
    /// Iteration cap per restart
    pub max_iter: usize,
    /// Convergence tolerance
    pub tol: f64,
    /// Random seed
    pub random_state: u64,
    /// Restart parallelism
    pub n_jobs: Option<usize>,
}

impl TrainParams {
    /// Parameters for `k` clusters using the configured defaults
    pub fn new(k: usize, defaults: &KMeansDefaults) -> Self {
        Self {
            k,
            init: defaults.init,
            n_init: defaults.n_init,
            max_iter: defaults.max_iter,
            tol: defaults.tol,
            random_state: defaults.random_state,
            n_jobs: defaults.n_jobs,
        }
    }

    /// The k-means estimator these parameters describe
    pub fn estimator(&self) -> KMeans {
        let kmeans = KMeans::new(self.k)
            .init_method(self.init)
            .n_init(self.n_init)
            .max_iter(self.max_iter)
            .tolerance(self.tol)
            .random_state(self.random_state);
        match self.n_jobs {
            Some(jobs) => kmeans.n_jobs(jobs),
            None => kmeans,
        }
    }
}

/// A fitted model: immutable once trained
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    /// Number of clusters
    pub k: usize,
    /// Cluster id per sample, in `0..k`
    pub labels: Vec<usize>,
    /// k x features, in preprocessed space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
    /// Iterations used by the winning restart
    pub n_iter: usize,
    /// The parameters actually used (k after raising)
    pub params: TrainParams,
}

impl TrainedModel {
    /// Members per cluster id, including empty clusters
    pub fn cluster_sizes(&self) -> Vec<usize> {
        cluster_sizes(ndarray::ArrayView1::from(self.labels.as_slice()), self.k)
    }

    /// Number of distinct labels actually assigned
    pub fn n_distinct_labels(&self) -> usize {
        distinct_labels(&self.labels).len()
    }
}

/// Fit k-means once on `data`
///
/// `k < 2` is raised to 2; `k >= n_samples` is rejected.
pub fn train(data: ArrayView2<f64>, params: &TrainParams) -> Result<TrainedModel> {
    let mut params = params.clone();
    if params.k < MIN_CLUSTERS {
        params.k = MIN_CLUSTERS;
    }

    let n_samples = data.nrows();
    if params.k >= n_samples {
        return Err(Error::invalid_parameter(format!(
            "k={} is too large for n={} samples",
            params.k, n_samples
        )));
    }

    let result = params.estimator().fit(data)?;

    info!(
        k = params.k,
        inertia = result.inertia,
        n_iter = result.n_iter,
        converged = result.converged,
        "Trained k-means model"
    );

    Ok(TrainedModel {
        k: params.k,
        labels: result.labels.to_vec(),
        centroids: result.centroids,
        inertia: result.inertia,
        n_iter: result.n_iter,
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn data() -> Array2<f64> {
        arr2(&[[0.0], [0.2], [5.0], [5.3], [10.0], [10.1]])
    }

    fn params(k: usize) -> TrainParams {
        TrainParams::new(k, &KMeansDefaults::default())
    }

    #[test]
    fn test_train_basic() {
        let model = train(data().view(), &params(3)).unwrap();
        assert_eq!(model.k, 3);
        assert_eq!(model.labels.len(), 6);
        assert!(model.labels.iter().all(|&l| l < 3));
        assert_eq!(model.n_distinct_labels(), 3);
        let mut sizes = model.cluster_sizes();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 2, 2]);
        assert_eq!(model.centroids.dim(), (3, 1));
    }

    #[test]
    fn test_k_below_two_is_raised() {
        let model = train(data().view(), &params(1)).unwrap();
        assert_eq!(model.k, 2);
        assert_eq!(model.params.k, 2);
        assert_eq!(model.centroids.nrows(), 2);

        let model = train(data().view(), &params(0)).unwrap();
        assert_eq!(model.k, 2);
    }

    #[test]
    fn test_k_at_least_sample_count_is_rejected() {
        let err = train(data().view(), &params(6)).unwrap_err();
        assert!(err.is_precondition());
        assert!(train(data().view(), &params(40)).is_err());
    }

    #[test]
    fn test_estimator_carries_params() {
        let defaults = KMeansDefaults {
            n_jobs: Some(1),
            ..KMeansDefaults::default()
        };
        let kmeans = TrainParams::new(4, &defaults).estimator();
        assert_eq!(kmeans.n_clusters, 4);
        assert_eq!(kmeans.n_init, 10);
        assert_eq!(kmeans.random_state, Some(42));
        assert_eq!(kmeans.n_jobs, Some(1));
        assert_eq!(params(4).estimator().n_jobs, None);
    }

    #[test]
    fn test_training_is_deterministic() {
        let a = train(data().view(), &params(2)).unwrap();
        let b = train(data().view(), &params(2)).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
    }
}
