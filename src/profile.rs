//! Cluster profiling and rule-based recommendations
//!
//! Two views of a trained model are produced here:
//!
//! - [`ClusterProfile`]: per cluster and feature, the centroid mapped back to
//!   original scale and the most frequent original value among the members.
//! - [`ClusterMeans`]: per-cluster feature means in the preprocessed space,
//!   which drive feature importance, cluster traits and recommendations.

use crate::config::{RecommendationRules, FEATURES_PLACEHOLDER};
use crate::dataset::{Dataset, Value};
use crate::preprocess::{Preprocessed, ONEHOT_SEPARATOR};
use crate::trainer::TrainedModel;
use crate::utils::distinct_labels;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Feature name to human-readable label
pub type DisplayNames = BTreeMap<String, String>;

/// Number of traits reported per cluster
pub const TRAITS_PER_CLUSTER: usize = 3;

/// Average and mode of one feature within one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProfile {
    /// Centroid coordinate in original scale
    pub average: Option<f64>,
    /// Most frequent original value among the cluster's members
    pub mode: Option<Value>,
}

/// Cluster id to feature name to profile
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterProfile {
    /// Profiles for every cluster id in `0..k`
    pub clusters: BTreeMap<usize, BTreeMap<String, FeatureProfile>>,
}

impl ClusterProfile {
    /// Profile `model` against the data it was trained on
    ///
    /// Averages come from inverse-transforming the centroids (raw centroids
    /// when no scaler was fitted). Modes are taken from the member rows of
    /// each feature's source column, so the two can disagree.
    pub fn build(model: &TrainedModel, data: &Preprocessed) -> Self {
        let averages = match &data.scaler {
            Some(scaler) => scaler.inverse_transform(model.centroids.view()),
            None => model.centroids.clone(),
        };

        let mut clusters = BTreeMap::new();
        for cluster in 0..model.k {
            let members: Vec<usize> = model
                .labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == cluster)
                .map(|(i, _)| i)
                .collect();

            let features = data
                .feature_names
                .iter()
                .enumerate()
                .map(|(j, name)| {
                    let average = averages
                        .get([cluster, j])
                        .copied()
                        .filter(|v| v.is_finite());
                    let mode = data
                        .feature_sources
                        .get(j)
                        .and_then(|&col| column_mode(&data.original, col, &members));
                    (name.clone(), FeatureProfile { average, mode })
                })
                .collect();

            clusters.insert(cluster, features);
        }

        Self { clusters }
    }

    /// Profile of one cluster
    pub fn cluster(&self, id: usize) -> Option<&BTreeMap<String, FeatureProfile>> {
        self.clusters.get(&id)
    }
}

/// Most frequent non-missing value of `column` over `rows`; ties go to the smallest value
fn column_mode(data: &Dataset, column: usize, rows: &[usize]) -> Option<Value> {
    let mut counts: Vec<(Value, usize)> = Vec::new();
    for &row in rows {
        let Some(value) = data.rows().get(row).and_then(|r| r.get(column)) else {
            continue;
        };
        if value.is_missing() {
            continue;
        }
        match counts.iter_mut().find(|(v, _)| v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value.clone(), 1)),
        }
    }

    counts
        .into_iter()
        .max_by(|(a, na), (b, nb)| na.cmp(nb).then_with(|| b.total_cmp(a)))
        .map(|(value, _)| value)
}

/// Label shown to users for a feature
///
/// Looks up the exact name, then the base name before the one-hot
/// separator, and falls back to the base name itself.
pub fn display_name(feature: &str, names: &DisplayNames) -> String {
    let base = feature
        .split(ONEHOT_SEPARATOR)
        .next()
        .unwrap_or(feature);
    names
        .get(feature)
        .or_else(|| names.get(base))
        .cloned()
        .unwrap_or_else(|| base.to_string())
}

/// Per-cluster feature means in preprocessed space
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterMeans {
    feature_names: Vec<String>,
    /// Clusters that received members, ascending
    clusters: Vec<usize>,
    /// clusters x features
    means: Array2<f64>,
    global: Array1<f64>,
    /// Feature indices ordered by importance
    importance_order: Vec<usize>,
    importance: Vec<f64>,
}

impl ClusterMeans {
    /// Group `data` rows by label and average them
    ///
    /// Returns `None` for empty input or mismatched label count.
    pub fn compute(data: ArrayView2<f64>, labels: &[usize], feature_names: &[String]) -> Option<Self> {
        if data.nrows() == 0 || data.nrows() != labels.len() || data.ncols() != feature_names.len() {
            return None;
        }

        let clusters = distinct_labels(labels);
        let mut means = Array2::zeros((clusters.len(), data.ncols()));
        for (c, &label) in clusters.iter().enumerate() {
            let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == label).collect();
            let mean = data.select(Axis(0), &members).mean_axis(Axis(0))?;
            means.row_mut(c).assign(&mean);
        }
        let global = data.mean_axis(Axis(0))?;

        // Sample variance across cluster means; undefined with a single cluster
        let importance: Vec<f64> = if clusters.len() > 1 {
            means.var_axis(Axis(0), 1.0).to_vec()
        } else {
            vec![0.0; data.ncols()]
        };
        let mut importance_order: Vec<usize> = (0..data.ncols()).collect();
        importance_order.sort_by(|&a, &b| importance[b].total_cmp(&importance[a]));

        Some(Self {
            feature_names: feature_names.to_vec(),
            clusters,
            means,
            global,
            importance_order,
            importance,
        })
    }

    /// Clusters that received members
    pub fn clusters(&self) -> &[usize] {
        &self.clusters
    }

    /// Features with their between-cluster variance, most important first
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        self.importance_order
            .iter()
            .map(|&j| (self.feature_names[j].clone(), self.importance[j]))
            .collect()
    }

    /// Cluster mean minus global mean, per feature in importance order
    pub fn deltas(&self, cluster: usize) -> Option<Vec<(String, f64)>> {
        let row = self.clusters.binary_search(&cluster).ok()?;
        Some(
            self.importance_order
                .iter()
                .map(|&j| {
                    (
                        self.feature_names[j].clone(),
                        self.means[[row, j]] - self.global[j],
                    )
                })
                .collect(),
        )
    }

    /// Features where `cluster` deviates most from the global mean
    pub fn traits(&self, cluster: usize, n: usize) -> Vec<String> {
        let Some(mut deltas) = self.deltas(cluster) else {
            return Vec::new();
        };
        deltas.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        deltas.into_iter().take(n).map(|(name, _)| name).collect()
    }

    /// Features where `cluster` falls furthest below the global mean
    pub fn weakest(&self, cluster: usize, n: usize) -> Vec<String> {
        let Some(mut deltas) = self.deltas(cluster) else {
            return Vec::new();
        };
        deltas.retain(|(_, d)| d.is_finite());
        deltas.sort_by(|a, b| a.1.total_cmp(&b.1));
        deltas.into_iter().take(n).map(|(name, _)| name).collect()
    }

    /// Recommendation lines for `cluster`
    ///
    /// A focus statement names the weakest features; keyword rules then add
    /// contextual actions. The list is capped at `rules.max_actions` and falls
    /// back to `rules.fallback` when empty.
    pub fn recommendations(
        &self,
        cluster: usize,
        rules: &RecommendationRules,
        names: &DisplayNames,
    ) -> Vec<String> {
        let weakest: Vec<String> = self
            .weakest(cluster, rules.worst_features)
            .iter()
            .map(|f| display_name(f, names))
            .collect();

        let mut actions = Vec::new();
        if !weakest.is_empty() {
            actions.push(
                rules
                    .focus_template
                    .replace(FEATURES_PLACEHOLDER, &weakest.join(", ")),
            );
        }

        let text = weakest.join(" ").to_lowercase();
        actions.extend(
            rules
                .rules
                .iter()
                .filter(|rule| rule.matches(&text))
                .map(|rule| rule.action.clone()),
        );

        actions.truncate(rules.max_actions);
        if actions.is_empty() {
            actions.push(rules.fallback.clone());
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KMeansDefaults;
    use crate::dataset::Dataset;
    use crate::preprocess::{preprocess, PreprocessConfig};
    use crate::trainer::TrainParams;
    use ndarray::arr2;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn means() -> ClusterMeans {
        // cluster 0 scores low on wait time, cluster 1 low on price
        let data = arr2(&[
            [1.0, 5.0, 3.0],
            [1.0, 5.0, 3.0],
            [5.0, 1.0, 3.2],
            [5.0, 1.0, 3.2],
        ]);
        ClusterMeans::compute(
            data.view(),
            &[0, 0, 1, 1],
            &names(&["wait_time", "price", "staff"]),
        )
        .unwrap()
    }

    #[test]
    fn test_display_name() {
        let mut map = DisplayNames::new();
        map.insert("q1".into(), "How long did you wait?".into());
        map.insert("q2__yes".into(), "Returning customer (yes)".into());

        assert_eq!(display_name("q1", &map), "How long did you wait?");
        assert_eq!(display_name("q1__a", &map), "How long did you wait?");
        assert_eq!(display_name("q2__yes", &map), "Returning customer (yes)");
        assert_eq!(display_name("q2__no", &map), "q2");
        assert_eq!(display_name("plain", &map), "plain");
    }

    #[test]
    fn test_feature_importance_order() {
        let importance = means().feature_importance();
        let order: Vec<&str> = importance.iter().map(|(n, _)| n.as_str()).collect();
        // wait_time and price tie at variance 8; stable order keeps wait_time first
        assert_eq!(order, vec!["wait_time", "price", "staff"]);
        assert!((importance[0].1 - 8.0).abs() < 1e-12);
        assert!((importance[2].1 - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_traits_and_weakest() {
        let m = means();
        assert_eq!(m.traits(0, 2), vec!["wait_time", "price"]);
        assert_eq!(m.weakest(0, 1), vec!["wait_time"]);
        assert_eq!(m.weakest(1, 1), vec!["price"]);
        assert!(m.traits(7, 3).is_empty());
    }

    #[test]
    fn test_recommendations_use_keywords() {
        let m = means();
        let rules = RecommendationRules::default();
        let actions = m.recommendations(0, &rules, &DisplayNames::new());

        // weakest first: wait_time (-2), staff (-0.1), price (+2)
        assert_eq!(actions.len(), 3);
        assert_eq!(
            actions[0],
            "Focus improvements on: wait_time, staff, price (cluster average below overall)."
        );
        assert!(actions[1].starts_with("Reduce waiting time"));
        assert!(actions[2].starts_with("Coach frontline staff"));
    }

    #[test]
    fn test_recommendations_use_display_names() {
        let m = means();
        let rules = RecommendationRules {
            worst_features: 1,
            ..Default::default()
        };
        let mut map = DisplayNames::new();
        map.insert("price".into(), "Value for the COST".into());

        let actions = m.recommendations(1, &rules, &map);
        assert_eq!(actions.len(), 2);
        assert!(actions[0].contains("Value for the COST"));
        assert!(actions[1].starts_with("Price transparency"));
    }

    #[test]
    fn test_recommendations_fallback() {
        let m = means();
        let rules = RecommendationRules {
            max_actions: 0,
            ..Default::default()
        };
        assert_eq!(
            m.recommendations(0, &rules, &DisplayNames::new()),
            vec![rules.fallback.clone()]
        );
    }

    #[test]
    fn test_profile_inverts_scaling_and_takes_modes() {
        let dataset = Dataset::from_csv_str("a,b\n1,x\n1,x\n2,y\n9,z\n9,z\n8,z\n").unwrap();
        let config = PreprocessConfig::parse("none", "label", "standard").unwrap();
        let pre = preprocess(&dataset, &names(&["a", "b"]), &config).unwrap();

        let model = crate::trainer::train(
            pre.matrix.view(),
            &TrainParams::new(2, &KMeansDefaults::default()),
        )
        .unwrap();
        let profile = ClusterProfile::build(&model, &pre);
        assert_eq!(profile.clusters.len(), 2);

        let low = model.labels[0];
        let low_profile = profile.cluster(low).unwrap();
        let avg = low_profile["a"].average.unwrap();
        assert!((avg - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(low_profile["a"].mode, Some(Value::Number(1.0)));
        assert_eq!(low_profile["b"].mode, Some(Value::Text("x".into())));

        let high_profile = profile.cluster(model.labels[3]).unwrap();
        assert_eq!(high_profile["a"].mode, Some(Value::Number(9.0)));
    }

    #[test]
    fn test_mode_tie_takes_smallest() {
        let dataset = Dataset::from_csv_str("a\n3\n2\n3\n2\n").unwrap();
        assert_eq!(column_mode(&dataset, 0, &[0, 1, 2, 3]), Some(Value::Number(2.0)));
        assert_eq!(column_mode(&dataset, 0, &[]), None);
    }
}
