//! Initialization methods for k-means clustering

use crate::distance::squared_euclidean;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Initialization methods for k-means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InitMethod {
    /// k-means++ seeding - each new centre drawn proportionally to squared distance
    #[default]
    KMeansPlusPlus,
    /// Random initialization - k distinct data points as initial centroids
    Random,
}

impl InitMethod {
    /// Canonical name (`k-means++` or `random`)
    pub fn as_str(&self) -> &'static str {
        match self {
            InitMethod::KMeansPlusPlus => "k-means++",
            InitMethod::Random => "random",
        }
    }
}

impl FromStr for InitMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "k-means++" | "kmeans++" | "kmeans_plus_plus" => Ok(InitMethod::KMeansPlusPlus),
            "random" => Ok(InitMethod::Random),
            _ => Err(Error::unknown_policy("init", s)),
        }
    }
}

impl TryFrom<String> for InitMethod {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<InitMethod> for String {
    fn from(method: InitMethod) -> String {
        method.as_str().to_string()
    }
}

impl fmt::Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Initialize centroids for k-means clustering
pub fn initialize_centroids<R>(
    data: ArrayView2<f64>,
    n_clusters: usize,
    method: InitMethod,
    rng: &mut R,
) -> Result<Array2<f64>>
where
    R: Rng,
{
    if n_clusters == 0 {
        return Err(Error::invalid_parameter("Number of clusters must be > 0"));
    }

    if n_clusters > data.nrows() {
        return Err(Error::invalid_parameter(
            "Number of clusters cannot exceed number of data points",
        ));
    }

    let indices = match method {
        InitMethod::Random => random_init(data.nrows(), n_clusters, rng),
        InitMethod::KMeansPlusPlus => kmeans_plus_plus_init(data, n_clusters, rng)?,
    };

    let mut centroids = Array2::zeros((n_clusters, data.ncols()));
    for (i, &data_idx) in indices.iter().enumerate() {
        centroids.row_mut(i).assign(&data.row(data_idx));
    }

    Ok(centroids)
}

/// Random initialization: k distinct row indices, sampled without replacement
fn random_init<R: Rng>(n_points: usize, n_clusters: usize, rng: &mut R) -> Vec<usize> {
    rand::seq::index::sample(rng, n_points, n_clusters).into_vec()
}

/// k-means++ seeding: D² weighted sampling of successive centres
fn kmeans_plus_plus_init<R: Rng>(
    data: ArrayView2<f64>,
    n_clusters: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let n_points = data.nrows();
    let mut chosen = Vec::with_capacity(n_clusters);
    chosen.push(rng.gen_range(0..n_points));

    // Squared distance from each point to its nearest chosen centre
    let mut min_distances: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|row| squared_euclidean(row, data.row(chosen[0])))
        .collect();

    while chosen.len() < n_clusters {
        let total: f64 = min_distances.iter().sum();
        if !total.is_finite() {
            return Err(Error::initialization_failure(
                "Non-finite distances while seeding centroids",
            ));
        }

        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut picked = None;
            for (i, &d) in min_distances.iter().enumerate() {
                cumulative += d;
                if d > 0.0 && cumulative > target {
                    picked = Some(i);
                    break;
                }
            }
            // Rounding can leave the draw past the last cumulative step
            picked.unwrap_or_else(|| {
                min_distances
                    .iter()
                    .rposition(|&d| d > 0.0)
                    .unwrap_or(n_points - 1)
            })
        } else {
            // Every point coincides with a chosen centre; fall back to a fresh index
            let remaining: Vec<usize> = (0..n_points).filter(|i| !chosen.contains(i)).collect();
            *remaining
                .choose(rng)
                .ok_or_else(|| Error::initialization_failure("Insufficient data points"))?
        };

        chosen.push(next);
        let centre = data.row(next);
        for (d, row) in min_distances.iter_mut().zip(data.rows()) {
            *d = d.min(squared_euclidean(row, centre));
        }
    }

    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn sample() -> Array2<f64> {
        arr2(&[[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]])
    }

    #[test]
    fn test_random_init() {
        let mut rng = StdRng::seed_from_u64(42);
        let indices = random_init(4, 3, &mut rng);
        assert_eq!(indices.len(), 3);
        let unique: std::collections::HashSet<_> = indices.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_kmeans_plus_plus_spreads_centres() {
        let data = sample();
        // With two tight groups the second centre lands in the other group almost surely
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let centroids =
                initialize_centroids(data.view(), 2, InitMethod::KMeansPlusPlus, &mut rng).unwrap();
            let gap = (centroids[[0, 0]] - centroids[[1, 0]]).abs();
            assert!(gap > 5.0, "seed {seed} picked centres in the same group");
        }
    }

    #[test]
    fn test_kmeans_plus_plus_duplicate_points() {
        let data = arr2(&[[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]);
        let mut rng = StdRng::seed_from_u64(7);
        let centroids =
            initialize_centroids(data.view(), 3, InitMethod::KMeansPlusPlus, &mut rng).unwrap();
        assert_eq!(centroids.dim(), (3, 2));
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let data = sample();
        for method in [InitMethod::Random, InitMethod::KMeansPlusPlus] {
            let a = initialize_centroids(data.view(), 2, method, &mut StdRng::seed_from_u64(3)).unwrap();
            let b = initialize_centroids(data.view(), 2, method, &mut StdRng::seed_from_u64(3)).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let data = sample();
        let mut rng = StdRng::seed_from_u64(42);

        // Test zero clusters
        assert!(initialize_centroids(data.view(), 0, InitMethod::Random, &mut rng).is_err());

        // Test more clusters than data points
        assert!(initialize_centroids(data.view(), 5, InitMethod::Random, &mut rng).is_err());
    }

    #[test]
    fn test_init_method_names() {
        assert_eq!("k-means++".parse::<InitMethod>().unwrap(), InitMethod::KMeansPlusPlus);
        assert_eq!("Random".parse::<InitMethod>().unwrap(), InitMethod::Random);
        assert!("huang".parse::<InitMethod>().is_err());
        assert_eq!(InitMethod::default().to_string(), "k-means++");
    }
}
