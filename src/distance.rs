//! Distance metrics over numeric feature vectors

use crate::error::{Error, Result};
use ndarray::{ArrayView1, ArrayView2};

/// Trait for computing distances between feature vectors
pub trait Metric {
    /// Compute distance between two points
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64>;

    /// Compute distances between a single point and every centroid
    fn distances_to_centroids(
        &self,
        point: ArrayView1<f64>,
        centroids: ArrayView2<f64>,
    ) -> Result<Vec<f64>> {
        if centroids.ncols() != point.len() {
            return Err(Error::invalid_data(
                "Point and centroids must have same number of features",
            ));
        }

        centroids
            .rows()
            .into_iter()
            .map(|centroid| self.distance(point, centroid))
            .collect()
    }
}

/// Euclidean (L2) distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl Metric for Euclidean {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
        SquaredEuclidean.distance(a, b).map(f64::sqrt)
    }
}

/// Squared Euclidean distance, the k-means objective
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredEuclidean;

impl Metric for SquaredEuclidean {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
        if a.len() != b.len() {
            return Err(Error::invalid_data("Vectors must have the same length"));
        }

        Ok(a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum())
    }
}

/// Unchecked squared Euclidean distance for hot loops where dimensions are already validated
#[inline]
pub(crate) fn squared_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_euclidean_distance() {
        let a = arr1(&[1.0, 2.0, 3.0]);
        let b = arr1(&[4.0, 5.0, 6.0]);

        let result = Euclidean.distance(a.view(), b.view()).unwrap();
        let expected = (27.0_f64).sqrt();
        assert!((result - expected).abs() < 1e-10);
    }

    #[test]
    fn test_squared_euclidean_distance() {
        let a = arr1(&[0.0, 0.0]);
        let b = arr1(&[3.0, 4.0]);
        assert_eq!(SquaredEuclidean.distance(a.view(), b.view()).unwrap(), 25.0);
        assert_eq!(squared_euclidean(a.view(), b.view()), 25.0);
    }

    #[test]
    fn test_length_mismatch() {
        let a = arr1(&[1.0]);
        let b = arr1(&[1.0, 2.0]);
        assert!(Euclidean.distance(a.view(), b.view()).is_err());
    }

    #[test]
    fn test_distances_to_centroids() {
        let point = arr1(&[0.0, 0.0]);
        let centroids = arr2(&[[3.0, 4.0], [0.0, 1.0]]);
        let d = Euclidean
            .distances_to_centroids(point.view(), centroids.view())
            .unwrap();
        assert_eq!(d, vec![5.0, 1.0]);
    }
}
