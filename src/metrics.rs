//! Cluster quality metrics
//!
//! Davies-Bouldin index and silhouette score, both over Euclidean distance
//! in the preprocessed feature space, plus the silhouette-vs-k curve.

use crate::config::KMeansDefaults;
use crate::distance::{Euclidean, Metric};
use crate::error::{Error, Result};
use crate::plot;
use crate::trainer::{train, TrainParams, MIN_CLUSTERS};
use crate::utils::distinct_labels;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Davies-Bouldin index (lower is better)
///
/// Requires between 2 and `n_samples - 1` distinct labels.
pub fn davies_bouldin(data: ArrayView2<f64>, labels: &[usize]) -> Result<f64> {
    if data.nrows() != labels.len() {
        return Err(Error::invalid_data(format!(
            "Label count {} does not match sample count {}",
            labels.len(),
            data.nrows()
        )));
    }

    let clusters = distinct_labels(labels);
    let n_labels = clusters.len();
    if n_labels < MIN_CLUSTERS || n_labels >= data.nrows() {
        return Err(Error::invalid_parameter(format!(
            "Davies-Bouldin index needs 2 <= distinct labels <= n_samples - 1, got {n_labels}"
        )));
    }

    let centroids = label_centroids(data, labels, &clusters);
    let mut intra = vec![0.0; n_labels];
    for (c, &label) in clusters.iter().enumerate() {
        let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == label).collect();
        let total = members
            .iter()
            .map(|&i| Euclidean.distance(data.row(i), centroids.row(c)))
            .sum::<Result<f64>>()?;
        intra[c] = total / members.len() as f64;
    }

    let mut separation = Array2::<f64>::zeros((n_labels, n_labels));
    for i in 0..n_labels {
        for j in 0..n_labels {
            separation[[i, j]] = Euclidean.distance(centroids.row(i), centroids.row(j))?;
        }
    }

    if intra.iter().all(|s| s.abs() < f64::EPSILON)
        || separation.iter().all(|d| d.abs() < f64::EPSILON)
    {
        return Ok(0.0);
    }

    let mut worst_sum = 0.0;
    for i in 0..n_labels {
        let worst = (0..n_labels)
            .filter(|&j| j != i)
            .map(|j| {
                let d = separation[[i, j]];
                let d = if d == 0.0 { f64::INFINITY } else { d };
                (intra[i] + intra[j]) / d
            })
            .fold(f64::NEG_INFINITY, f64::max);
        worst_sum += worst;
    }

    Ok(worst_sum / n_labels as f64)
}

/// Mean silhouette coefficient
///
/// Returns `None` when the label count differs from the sample count, or when
/// the number of distinct labels is outside `2..=n_samples - 1`. Members of
/// singleton clusters score 0.
pub fn silhouette_score(data: ArrayView2<f64>, labels: &[usize]) -> Option<f64> {
    let n = data.nrows();
    if n != labels.len() {
        return None;
    }
    let clusters = distinct_labels(labels);
    if clusters.len() < MIN_CLUSTERS || clusters.len() >= n {
        return None;
    }

    let sizes: Vec<usize> = clusters
        .iter()
        .map(|&c| labels.iter().filter(|&&l| l == c).count())
        .collect();
    let slot = |label: usize| clusters.binary_search(&label).unwrap_or(0);

    let mut total = 0.0;
    for i in 0..n {
        let own = slot(labels[i]);
        if sizes[own] <= 1 {
            continue;
        }

        let mut sums = vec![0.0; clusters.len()];
        for j in 0..n {
            if i != j {
                sums[slot(labels[j])] += Euclidean.distance(data.row(i), data.row(j)).ok()?;
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..clusters.len())
            .filter(|&c| c != own)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Some(total / n as f64)
}

/// Silhouette score for every k in a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilhouetteCurve {
    /// Every k in `[k_min, k_max]`
    pub ks: Vec<usize>,
    /// Score per k; `None` where k is invalid for the data or the fit failed
    pub scores: Vec<Option<f64>>,
}

impl SilhouetteCurve {
    /// Render as an SVG line plot, skipping undefined entries
    pub fn plot_svg(&self) -> Result<String> {
        plot::silhouette_chart(&self.ks, &self.scores)
    }
}

/// Train and score a model for every k in `[k_min, k_max]`
///
/// Unlike the elbow sweep, a failing k only leaves a hole in the curve.
pub fn silhouette_curve(
    data: ArrayView2<f64>,
    k_min: usize,
    k_max: usize,
    defaults: &KMeansDefaults,
) -> Result<SilhouetteCurve> {
    if k_max < k_min {
        return Err(Error::invalid_parameter(format!(
            "k_max ({k_max}) must be >= k_min ({k_min})"
        )));
    }

    let n = data.nrows();
    let ks: Vec<usize> = (k_min..=k_max).collect();
    let scores = ks
        .iter()
        .map(|&k| {
            if k < MIN_CLUSTERS || k >= n {
                return None;
            }
            match train(data, &TrainParams::new(k, defaults)) {
                Ok(model) => {
                    let score = silhouette_score(data, &model.labels);
                    debug!(k, ?score, "Silhouette curve entry");
                    score
                }
                Err(e) => {
                    warn!(k, error = %e, "Silhouette curve fit failed");
                    None
                }
            }
        })
        .collect();

    Ok(SilhouetteCurve { ks, scores })
}

/// Mean of the members of each label, in `clusters` order
fn label_centroids(data: ArrayView2<f64>, labels: &[usize], clusters: &[usize]) -> Array2<f64> {
    let mut centroids = Array2::zeros((clusters.len(), data.ncols()));
    for (c, &label) in clusters.iter().enumerate() {
        let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == label).collect();
        if let Some(mean) = data.select(Axis(0), &members).mean_axis(Axis(0)) {
            centroids.row_mut(c).assign(&mean);
        }
    }
    centroids
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn two_blobs() -> (Array2<f64>, Vec<usize>) {
        (
            arr2(&[[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]]),
            vec![0, 0, 1, 1],
        )
    }

    #[test]
    fn test_davies_bouldin_two_blobs() {
        let (data, labels) = two_blobs();
        // intra = 0.5 per cluster, centroid distance = 10
        let dbi = davies_bouldin(data.view(), &labels).unwrap();
        assert!((dbi - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_davies_bouldin_label_ids_need_not_be_contiguous() {
        let (data, _) = two_blobs();
        let dbi = davies_bouldin(data.view(), &[3, 3, 7, 7]).unwrap();
        assert!((dbi - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_davies_bouldin_requires_two_labels() {
        let (data, _) = two_blobs();
        let err = davies_bouldin(data.view(), &[0, 0, 0, 0]).unwrap_err();
        assert!(err.is_precondition());
        assert!(davies_bouldin(data.view(), &[0, 1, 2, 3]).is_err());
        assert!(davies_bouldin(data.view(), &[0, 1]).is_err());
    }

    #[test]
    fn test_davies_bouldin_zero_spread() {
        let data = arr2(&[[1.0], [1.0], [2.0], [2.0]]);
        assert_eq!(davies_bouldin(data.view(), &[0, 0, 1, 1]).unwrap(), 0.0);
    }

    #[test]
    fn test_silhouette_two_blobs() {
        let (data, labels) = two_blobs();
        let score = silhouette_score(data.view(), &labels).unwrap();
        // a = 1, b = (10 + sqrt(101)) / 2 for every point
        let b = (10.0 + 101f64.sqrt()) / 2.0;
        assert!((score - (b - 1.0) / b).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_undefined_cases() {
        let (data, labels) = two_blobs();
        assert_eq!(silhouette_score(data.view(), &[0, 0, 0, 0]), None);
        assert_eq!(silhouette_score(data.view(), &labels[..3]), None);
        assert_eq!(silhouette_score(data.view(), &[0, 1, 2, 3]), None);
    }

    #[test]
    fn test_silhouette_singleton_scores_zero() {
        let data = arr2(&[[0.0], [1.0], [10.0]]);
        let score = silhouette_score(data.view(), &[0, 0, 1]).unwrap();
        // points 0 and 1: a = 1, b = 10 and 9; point 2 is a singleton
        let expected = ((10.0 - 1.0) / 10.0 + (9.0 - 1.0) / 9.0) / 3.0;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_curve_tolerates_invalid_k() {
        let data = arr2(&[[0.0], [0.1], [5.0], [5.1], [9.0]]);
        let curve = silhouette_curve(data.view(), 1, 6, &KMeansDefaults::default()).unwrap();
        assert_eq!(curve.ks, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(curve.scores[0], None);
        assert!(curve.scores[1].is_some());
        assert!(curve.scores[2].is_some());
        assert_eq!(curve.scores[4], None);
        assert_eq!(curve.scores[5], None);
        for score in curve.scores.iter().flatten() {
            assert!((-1.0..=1.0).contains(score));
        }
    }

    #[test]
    fn test_silhouette_curve_rejects_inverted_range() {
        let (data, _) = two_blobs();
        assert!(silhouette_curve(data.view(), 4, 2, &KMeansDefaults::default()).is_err());
    }
}
