//! K-means clustering algorithm implementation

use crate::distance::squared_euclidean;
use crate::error::{Error, Result};
use crate::initialization::{initialize_centroids, InitMethod};
use crate::utils::{
    assign_points_to_centroids, assignments_equal, calculate_inertia, get_cluster_indices,
    validate_data, validate_parameters,
};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// K-means clustering (Lloyd iteration with restarts)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    /// Number of clusters
    pub n_clusters: usize,
    /// Initialization method
    pub init_method: InitMethod,
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Tolerance for convergence, relative to the mean feature variance
    pub tol: f64,
    /// Number of initialization runs
    pub n_init: usize,
    /// Random seed for reproducibility
    pub random_state: Option<u64>,
    /// Number of parallel jobs (`Some(1)` forces sequential restarts)
    pub n_jobs: Option<usize>,
}

/// Result of k-means clustering
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster labels for each data point
    pub labels: Array1<usize>,
    /// Final cluster centroids
    pub centroids: Array2<f64>,
    /// Number of iterations until convergence
    pub n_iter: usize,
    /// Final inertia (within-cluster sum of squares)
    pub inertia: f64,
    /// Whether the algorithm converged
    pub converged: bool,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            n_clusters: 8,
            init_method: InitMethod::KMeansPlusPlus,
            max_iter: 300,
            tol: 1e-4,
            n_init: 10,
            random_state: None,
            n_jobs: None,
        }
    }
}

impl KMeans {
    /// Create a new k-means clusterer with specified number of clusters
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Default::default()
        }
    }

    /// Set the initialization method
    pub fn init_method(mut self, method: InitMethod) -> Self {
        self.init_method = method;
        self
    }

    /// Set the maximum number of iterations
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance
    pub fn tolerance(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the number of initialization runs
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the random seed for reproducibility
    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Set the number of parallel jobs
    pub fn n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// Fit k-means to the data, keeping the restart with the lowest inertia
    pub fn fit(&self, data: ArrayView2<f64>) -> Result<KMeansResult> {
        self.validate_input(data)?;

        let tol = self.tol * mean_feature_variance(data);
        let base_seed = self.random_state.unwrap_or(0);

        let results: Vec<Result<KMeansResult>> = if self.should_use_parallel() {
            (0..self.n_init)
                .into_par_iter()
                .map(|i| self.fit_single(data, base_seed.wrapping_add(i as u64), tol))
                .collect()
        } else {
            (0..self.n_init)
                .map(|i| self.fit_single(data, base_seed.wrapping_add(i as u64), tol))
                .collect()
        };

        // Restart order decides ties, so the outcome does not depend on scheduling
        let mut best_result: Option<KMeansResult> = None;
        for result in results {
            let result = result?;
            let better = best_result
                .as_ref()
                .map_or(true, |best| result.inertia < best.inertia);
            if better {
                best_result = Some(result);
            }
        }

        best_result.ok_or_else(|| Error::convergence_failure("No successful runs"))
    }

    /// Single run of Lloyd's algorithm from one seeded initialization
    fn fit_single(&self, data: ArrayView2<f64>, seed: u64, tol: f64) -> Result<KMeansResult> {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut centroids = initialize_centroids(data, self.n_clusters, self.init_method, &mut rng)?;
        let mut previous_labels: Option<Array1<usize>> = None;
        let mut n_iter = 0;
        let mut converged = false;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;

            let labels = assign_points_to_centroids(data, centroids.view())?;

            if let Some(ref prev_labels) = previous_labels {
                if assignments_equal(labels.view(), prev_labels.view()) {
                    converged = true;
                    debug!(seed, n_iter, "K-means assignments stable");
                    break;
                }
            }

            let new_centroids = self.update_centroids(data, &labels, centroids.view())?;
            let shift = centroid_shift(&centroids, &new_centroids);
            centroids = new_centroids;

            if shift <= tol {
                converged = true;
                debug!(seed, n_iter, shift, "K-means centroid shift below tolerance");
                break;
            }

            previous_labels = Some(labels);
        }

        let labels = assign_points_to_centroids(data, centroids.view())?;
        let inertia = calculate_inertia(data, centroids.view(), labels.view())?;

        if !converged {
            debug!(seed, max_iter = self.max_iter, inertia, "K-means hit iteration cap");
        }

        Ok(KMeansResult {
            labels,
            centroids,
            n_iter,
            inertia,
            converged,
        })
    }

    /// Recompute each centroid as the mean of its members
    ///
    /// An empty cluster takes the point farthest from its current centroid.
    fn update_centroids(
        &self,
        data: ArrayView2<f64>,
        labels: &Array1<usize>,
        previous: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        let cluster_indices = get_cluster_indices(labels.view(), self.n_clusters);
        let mut new_centroids = Array2::zeros((self.n_clusters, data.ncols()));
        let mut taken: Vec<usize> = Vec::new();

        for (cluster_id, indices) in cluster_indices.iter().enumerate() {
            if indices.is_empty() {
                let far = farthest_point(data, previous, labels, &taken)?;
                warn!(cluster_id, point = far, "Reseeding empty k-means cluster");
                taken.push(far);
                new_centroids.row_mut(cluster_id).assign(&data.row(far));
            } else {
                let members = data.select(Axis(0), indices);
                let mean = members
                    .mean_axis(Axis(0))
                    .ok_or_else(|| Error::computation_error("Cannot average an empty cluster"))?;
                new_centroids.row_mut(cluster_id).assign(&mean);
            }
        }

        Ok(new_centroids)
    }

    /// Validate input parameters and data
    fn validate_input(&self, data: ArrayView2<f64>) -> Result<()> {
        validate_parameters(self.n_clusters, self.max_iter, self.tol, self.n_init)?;
        validate_data(data)?;

        if self.n_clusters > data.nrows() {
            return Err(Error::invalid_parameter(format!(
                "Number of clusters ({}) cannot exceed number of data points ({})",
                self.n_clusters,
                data.nrows()
            )));
        }

        Ok(())
    }

    /// Determine if parallel processing should be used
    fn should_use_parallel(&self) -> bool {
        match self.n_jobs {
            Some(1) => false,
            Some(_) => true,
            None => self.n_init > 1, // Use parallel by default for multiple inits
        }
    }

    /// Fit the model and predict cluster assignments
    pub fn fit_predict(&self, data: ArrayView2<f64>) -> Result<Array1<usize>> {
        let result = self.fit(data)?;
        Ok(result.labels)
    }
}

impl KMeansResult {
    /// Number of clusters
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Assign new points to the fitted centroids
    pub fn predict(&self, data: ArrayView2<f64>) -> Result<Array1<usize>> {
        validate_data(data)?;
        assign_points_to_centroids(data, self.centroids.view())
    }
}

/// Average per-feature variance, the scale for the convergence tolerance
fn mean_feature_variance(data: ArrayView2<f64>) -> f64 {
    data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

/// Total squared movement of all centroids between two iterations
fn centroid_shift(old: &Array2<f64>, new: &Array2<f64>) -> f64 {
    old.iter().zip(new.iter()).map(|(a, b)| (a - b).powi(2)).sum()
}

fn farthest_point(
    data: ArrayView2<f64>,
    centroids: ArrayView2<f64>,
    labels: &Array1<usize>,
    exclude: &[usize],
) -> Result<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, point) in data.rows().into_iter().enumerate() {
        if exclude.contains(&i) {
            continue;
        }
        let d = squared_euclidean(point, centroids.row(labels[i]));
        if best.map_or(true, |(_, bd)| d > bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| Error::computation_error("No point available to reseed an empty cluster"))
}
