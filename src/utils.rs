//! Utility functions for k-means clustering

use crate::distance::squared_euclidean;
use crate::error::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use std::collections::BTreeSet;

/// Find the closest centroid for a given data point
///
/// Returns the centroid index and its squared distance. Ties go to the lowest index.
pub fn find_closest_centroid(
    point: ArrayView1<f64>,
    centroids: ArrayView2<f64>,
) -> Result<(usize, f64)> {
    if centroids.nrows() == 0 {
        return Err(Error::invalid_data("No centroids provided"));
    }

    if centroids.ncols() != point.len() {
        return Err(Error::invalid_data("Point and centroids dimension mismatch"));
    }

    let mut min_distance = f64::INFINITY;
    let mut closest_centroid = 0;

    for (i, centroid) in centroids.rows().into_iter().enumerate() {
        let distance = squared_euclidean(point, centroid);
        if distance < min_distance {
            min_distance = distance;
            closest_centroid = i;
        }
    }

    Ok((closest_centroid, min_distance))
}

/// Assign all data points to their closest centroids
pub fn assign_points_to_centroids(
    data: ArrayView2<f64>,
    centroids: ArrayView2<f64>,
) -> Result<Array1<usize>> {
    let mut assignments = Array1::zeros(data.nrows());

    for (i, point) in data.rows().into_iter().enumerate() {
        assignments[i] = find_closest_centroid(point, centroids)?.0;
    }

    Ok(assignments)
}

/// Calculate inertia (within-cluster sum of squares) for current assignments
pub fn calculate_inertia(
    data: ArrayView2<f64>,
    centroids: ArrayView2<f64>,
    assignments: ArrayView1<usize>,
) -> Result<f64> {
    let mut total_cost = 0.0;

    for (i, point) in data.rows().into_iter().enumerate() {
        let cluster_id = assignments[i];
        if cluster_id >= centroids.nrows() {
            return Err(Error::invalid_data("Invalid cluster assignment"));
        }

        total_cost += squared_euclidean(point, centroids.row(cluster_id));
    }

    Ok(total_cost)
}

/// Check if two assignment arrays are equal (for convergence testing)
pub fn assignments_equal(a: ArrayView1<usize>, b: ArrayView1<usize>) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(&x, &y)| x == y)
}

/// Get indices of points assigned to each cluster
pub fn get_cluster_indices(assignments: ArrayView1<usize>, n_clusters: usize) -> Vec<Vec<usize>> {
    let mut cluster_indices = vec![Vec::new(); n_clusters];

    for (point_idx, &cluster_id) in assignments.iter().enumerate() {
        if cluster_id < n_clusters {
            cluster_indices[cluster_id].push(point_idx);
        }
    }

    cluster_indices
}

/// Calculate cluster sizes
pub fn cluster_sizes(assignments: ArrayView1<usize>, n_clusters: usize) -> Vec<usize> {
    let mut sizes = vec![0; n_clusters];

    for &cluster_id in assignments.iter() {
        if cluster_id < n_clusters {
            sizes[cluster_id] += 1;
        }
    }

    sizes
}

/// Distinct labels present, ascending
pub fn distinct_labels(labels: &[usize]) -> Vec<usize> {
    labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Validate clustering parameters
pub fn validate_parameters(
    n_clusters: usize,
    max_iter: usize,
    tol: f64,
    n_init: usize,
) -> Result<()> {
    if n_clusters == 0 {
        return Err(Error::invalid_parameter("n_clusters must be > 0"));
    }

    if max_iter == 0 {
        return Err(Error::invalid_parameter("max_iter must be > 0"));
    }

    if !(tol >= 0.0) {
        return Err(Error::invalid_parameter("tol must be >= 0"));
    }

    if n_init == 0 {
        return Err(Error::invalid_parameter("n_init must be > 0"));
    }

    Ok(())
}

/// Validate input data
pub fn validate_data(data: ArrayView2<f64>) -> Result<()> {
    if data.nrows() == 0 {
        return Err(Error::invalid_data("Data cannot be empty"));
    }

    if data.ncols() == 0 {
        return Err(Error::invalid_data("Data must have at least one feature"));
    }

    if data.iter().any(|x| !x.is_finite()) {
        return Err(Error::invalid_data(
            "Feature matrix contains missing or non-finite values",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_find_closest_centroid() {
        let point = arr1(&[0.9, 1.1]);
        let centroids = arr2(&[[1.0, 1.0], [5.0, 5.0]]);

        let (closest, dist) = find_closest_centroid(point.view(), centroids.view()).unwrap();
        assert_eq!(closest, 0);
        assert!((dist - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_equidistant_point_goes_to_lowest_index() {
        let point = arr1(&[0.0]);
        let centroids = arr2(&[[-1.0], [1.0]]);
        let (closest, _) = find_closest_centroid(point.view(), centroids.view()).unwrap();
        assert_eq!(closest, 0);
    }

    #[test]
    fn test_assign_points_to_centroids() {
        let data = arr2(&[[0.0, 0.0], [9.0, 9.0], [0.5, 0.0]]);
        let centroids = arr2(&[[0.0, 0.0], [10.0, 10.0]]);

        let assignments = assign_points_to_centroids(data.view(), centroids.view()).unwrap();

        assert_eq!(assignments.to_vec(), vec![0, 1, 0]);
    }

    #[test]
    fn test_calculate_inertia() {
        let data = arr2(&[[0.0, 0.0], [2.0, 0.0]]);
        let centroids = arr2(&[[1.0, 0.0]]);
        let assignments = arr1(&[0, 0]);

        let inertia = calculate_inertia(data.view(), centroids.view(), assignments.view()).unwrap();
        assert_eq!(inertia, 2.0);

        let bad = arr1(&[0, 3]);
        assert!(calculate_inertia(data.view(), centroids.view(), bad.view()).is_err());
    }

    #[test]
    fn test_assignments_equal() {
        let a = arr1(&[0, 1, 0, 1]);
        let b = arr1(&[0, 1, 0, 1]);
        let c = arr1(&[1, 0, 1, 0]);

        assert!(assignments_equal(a.view(), b.view()));
        assert!(!assignments_equal(a.view(), c.view()));
    }

    #[test]
    fn test_get_cluster_indices() {
        let assignments = arr1(&[0, 1, 0, 1, 2]);
        let indices = get_cluster_indices(assignments.view(), 3);

        assert_eq!(indices[0], vec![0, 2]);
        assert_eq!(indices[1], vec![1, 3]);
        assert_eq!(indices[2], vec![4]);
    }

    #[test]
    fn test_cluster_sizes() {
        let assignments = arr1(&[0, 1, 0, 1, 2]);
        assert_eq!(cluster_sizes(assignments.view(), 4), vec![2, 2, 1, 0]);
        assert_eq!(distinct_labels(&[2, 0, 2, 0]), vec![0, 2]);
    }

    #[test]
    fn test_validate_parameters() {
        assert!(validate_parameters(2, 100, 0.001, 10).is_ok());
        assert!(validate_parameters(0, 100, 0.001, 10).is_err()); // n_clusters = 0
        assert!(validate_parameters(2, 0, 0.001, 10).is_err()); // max_iter = 0
        assert!(validate_parameters(2, 100, -0.1, 10).is_err()); // negative tol
        assert!(validate_parameters(2, 100, f64::NAN, 10).is_err()); // NaN tol
        assert!(validate_parameters(2, 100, 0.001, 0).is_err()); // n_init = 0
    }

    #[test]
    fn test_validate_data() {
        assert!(validate_data(arr2(&[[1.0, 2.0]]).view()).is_ok());
        assert!(validate_data(ndarray::Array2::<f64>::zeros((0, 2)).view()).is_err());
        assert!(validate_data(arr2(&[[1.0, f64::NAN]]).view()).is_err());
    }
}
