//! Elbow-based selection of the number of clusters
//!
//! K-means is fitted for every k in an inclusive range with identical
//! hyperparameters, and the resulting WCSS curve is inspected by three
//! independent heuristics:
//!
//! - [`knee_point`]: Kneedle-style detection on the normalised convex,
//!   decreasing curve;
//! - [`chord_distance_point`]: the interior k farthest from the straight
//!   line joining the first and last points;
//! - [`curvature_point`]: the k with the largest absolute second difference.
//!
//! [`fuse_candidates`] combines their answers into a single suggestion.

use crate::config::KMeansDefaults;
use crate::error::{Error, Result};
use crate::plot;
use crate::trainer::{TrainParams, MIN_CLUSTERS};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kneedle sensitivity
const KNEE_SENSITIVITY: f64 = 1.0;

/// The candidate k proposed by each heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElbowCandidates {
    /// Knee-curve detector
    pub knee: Option<usize>,
    /// Maximum distance to the first-last chord
    pub chord: Option<usize>,
    /// Maximum absolute second difference
    pub curvature: Option<usize>,
}

/// WCSS series over a k range plus the suggested k
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElbowResult {
    /// Every k in `[k_min, k_max]`
    pub ks: Vec<usize>,
    /// WCSS for each k
    pub wcss: Vec<f64>,
    /// Fused suggestion, if any heuristic produced a candidate
    pub suggested_k: Option<usize>,
    /// WCSS at the suggested k
    pub wcss_at_k: Option<f64>,
    /// Individual heuristic answers
    pub candidates: ElbowCandidates,
}

impl ElbowResult {
    /// Build the result from an already computed curve
    pub fn from_curve(ks: Vec<usize>, wcss: Vec<f64>) -> Self {
        let candidates = ElbowCandidates {
            knee: knee_point(&ks, &wcss),
            chord: chord_distance_point(&ks, &wcss),
            curvature: curvature_point(&ks, &wcss),
        };
        let suggested_k = fuse_candidates(&candidates);
        let wcss_at_k = suggested_k
            .and_then(|k| ks.iter().position(|&x| x == k))
            .map(|idx| wcss[idx]);

        debug!(?candidates, ?suggested_k, "Elbow heuristics");

        Self {
            ks,
            wcss,
            suggested_k,
            wcss_at_k,
            candidates,
        }
    }

    /// Render the WCSS curve as an SVG line plot with the suggestion marked
    pub fn plot_svg(&self) -> Result<String> {
        plot::elbow_chart(&self.ks, &self.wcss, self.suggested_k)
    }
}

/// Fit k-means for every k in `[k_min, k_max]` and collect WCSS
///
/// Any failing fit aborts the sweep.
pub fn compute_wcss(
    data: ArrayView2<f64>,
    k_min: usize,
    k_max: usize,
    defaults: &KMeansDefaults,
) -> Result<(Vec<usize>, Vec<f64>)> {
    if k_min < MIN_CLUSTERS {
        return Err(Error::invalid_parameter(format!(
            "k_min must be >= {MIN_CLUSTERS}, got {k_min}"
        )));
    }
    if k_max < k_min {
        return Err(Error::invalid_parameter(format!(
            "k_max ({k_max}) must be >= k_min ({k_min})"
        )));
    }

    let ks: Vec<usize> = (k_min..=k_max).collect();
    let mut wcss = Vec::with_capacity(ks.len());
    for &k in &ks {
        let result = TrainParams::new(k, defaults).estimator().fit(data)?;
        debug!(k, wcss = result.inertia, "Elbow fit");
        wcss.push(result.inertia);
    }

    Ok((ks, wcss))
}

/// Run the full elbow analysis
pub fn compute_elbow(
    data: ArrayView2<f64>,
    k_min: usize,
    k_max: usize,
    defaults: &KMeansDefaults,
) -> Result<ElbowResult> {
    let (ks, wcss) = compute_wcss(data, k_min, k_max, defaults)?;
    Ok(ElbowResult::from_curve(ks, wcss))
}

/// Kneedle knee detection for a convex, decreasing curve
///
/// Returns `None` for flat or too-short curves, or when the difference
/// curve never drops below its threshold.
pub fn knee_point(ks: &[usize], wcss: &[f64]) -> Option<usize> {
    let n = ks.len();
    if n < 2 || wcss.len() != n {
        return None;
    }

    let x: Vec<f64> = ks.iter().map(|&k| k as f64).collect();
    let x_norm = normalize(&x)?;
    let y_norm = normalize(wcss)?;

    // Flip the convex decreasing curve into a concave increasing one
    let y_max = y_norm.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let difference: Vec<f64> = y_norm
        .iter()
        .zip(&x_norm)
        .map(|(y, x)| (y_max - y) - x)
        .collect();

    let neighbours = |i: usize| (difference[i.saturating_sub(1)], difference[(i + 1).min(n - 1)]);
    let maxima: Vec<usize> = (0..n)
        .filter(|&i| {
            let (prev, next) = neighbours(i);
            difference[i] >= prev && difference[i] >= next
        })
        .collect();
    let minima: Vec<usize> = (0..n)
        .filter(|&i| {
            let (prev, next) = neighbours(i);
            difference[i] <= prev && difference[i] <= next
        })
        .collect();

    let first_max = *maxima.first()?;
    let mean_step = x_norm.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (n - 1) as f64;
    let offset = KNEE_SENSITIVITY * mean_step.abs();

    let mut maxima_seen = 0;
    let mut threshold = difference[first_max] - offset;
    let mut threshold_index = first_max;

    for i in first_max..n {
        if x_norm[i] >= 1.0 {
            break;
        }
        if maxima.contains(&i) {
            threshold = difference[maxima[maxima_seen]] - offset;
            threshold_index = i;
            maxima_seen += 1;
        }
        if minima.contains(&i) {
            threshold = 0.0;
        }
        if difference[i + 1] < threshold {
            return Some(ks[threshold_index]);
        }
    }

    None
}

/// The k whose point lies farthest from the chord between the curve's endpoints
///
/// Endpoints are excluded when at least three points exist.
pub fn chord_distance_point(ks: &[usize], wcss: &[f64]) -> Option<usize> {
    let n = ks.len();
    if n == 0 || wcss.len() != n {
        return None;
    }

    let (x1, y1) = (ks[0] as f64, wcss[0]);
    let (x2, y2) = (ks[n - 1] as f64, wcss[n - 1]);
    let (dx, dy) = (x2 - x1, y2 - y1);
    let norm = (dx * dx + dy * dy).sqrt();
    let denom = if norm == 0.0 { 1.0 } else { norm };

    let distances: Vec<f64> = ks
        .iter()
        .zip(wcss)
        .map(|(&k, &y)| (dy * (k as f64 - x1) - dx * (y - y1)).abs() / denom)
        .collect();

    if n > 2 {
        argmax(&distances[1..n - 1]).map(|idx| ks[idx + 1])
    } else {
        argmax(&distances).map(|idx| ks[idx])
    }
}

/// The interior k with the largest absolute discrete second derivative
pub fn curvature_point(ks: &[usize], wcss: &[f64]) -> Option<usize> {
    let n = ks.len();
    if n < 3 || wcss.len() != n {
        return None;
    }

    let second_diff: Vec<f64> = wcss
        .windows(3)
        .map(|w| (w[2] - 2.0 * w[1] + w[0]).abs())
        .collect();

    argmax(&second_diff).map(|idx| ks[idx + 1])
}

/// Combine the heuristic candidates into one suggestion
///
/// Two candidates within one of each other win, taking the smaller; adjacent
/// distinct values are checked before exact agreement. Otherwise curvature is
/// preferred, then chord distance, then the knee detector.
pub fn fuse_candidates(candidates: &ElbowCandidates) -> Option<usize> {
    let present: Vec<usize> = [candidates.knee, candidates.chord, candidates.curvature]
        .into_iter()
        .flatten()
        .collect();

    let adjacent = present.iter().find_map(|&a| {
        present
            .iter()
            .find(|&&b| a != b && a.abs_diff(b) <= 1)
            .map(|&b| a.min(b))
    });
    if adjacent.is_some() {
        return adjacent;
    }

    let agreeing = present
        .iter()
        .enumerate()
        .find_map(|(i, &a)| present[i + 1..].contains(&a).then_some(a));
    if agreeing.is_some() {
        return agreeing;
    }

    candidates
        .curvature
        .or(candidates.chord)
        .or(candidates.knee)
}

fn normalize(values: &[f64]) -> Option<Vec<f64>> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range == 0.0 {
        return None;
    }
    Some(values.iter().map(|v| (v - min) / range).collect())
}

/// Index of the first maximum, ignoring NaN
fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}
