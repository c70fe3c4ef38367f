//! Service configuration
//!
//! Every section has defaults, so a JSON file only needs the fields it
//! overrides:
//!
//! ```json
//! { "elbow": { "k_max": 8 }, "kmeans": { "random_state": 7 } }
//! ```

use crate::error::Result;
use crate::initialization::InitMethod;
use crate::preprocess::PreprocessConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder replaced by the joined feature names in [`RecommendationRules::focus_template`]
pub const FEATURES_PLACEHOLDER: &str = "{features}";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// K-means hyperparameter defaults
    pub kmeans: KMeansDefaults,
    /// Default elbow sweep range
    pub elbow: ElbowDefaults,
    /// k used by training when neither the request nor the elbow sweep supplies one
    pub default_k: DefaultK,
    /// Preprocessing used when an upload does not specify one
    pub preprocessing: PreprocessConfig,
    /// Recommendation keyword table
    pub recommendations: RecommendationRules,
    /// Report wording
    pub report: ReportSettings,
}

/// Newtype so `default_k` gets its own serde default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultK(pub usize);

impl Default for DefaultK {
    fn default() -> Self {
        DefaultK(3)
    }
}

/// K-means hyperparameter defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansDefaults {
    /// Seeding strategy
    pub init: InitMethod,
    /// Restarts per fit
    pub n_init: usize,
    /// Iteration cap per restart
    pub max_iter: usize,
    /// Relative convergence tolerance
    pub tol: f64,
    /// Seed shared by elbow, training and silhouette curves
    pub random_state: u64,
    /// Restart parallelism; `Some(1)` forces sequential restarts
    pub n_jobs: Option<usize>,
}

impl Default for KMeansDefaults {
    fn default() -> Self {
        Self {
            init: InitMethod::KMeansPlusPlus,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
            n_jobs: None,
        }
    }
}

/// Default elbow sweep range (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElbowDefaults {
    /// Smallest k
    pub k_min: usize,
    /// Largest k
    pub k_max: usize,
}

impl Default for ElbowDefaults {
    fn default() -> Self {
        Self { k_min: 2, k_max: 10 }
    }
}

/// One keyword rule: if any keyword occurs in the weak features, suggest `action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Lowercase keywords matched as substrings
    pub keywords: Vec<String>,
    /// Recommendation text
    pub action: String,
}

impl KeywordRule {
    /// Build a rule from string slices
    pub fn new(keywords: &[&str], action: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            action: action.to_string(),
        }
    }

    /// Whether any keyword occurs in `text` (already lowercased)
    pub fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
    }
}

/// Keyword table and templates for cluster recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationRules {
    /// How many below-average features feed the recommendation
    pub worst_features: usize,
    /// Upper bound on recommendations per cluster
    pub max_actions: usize,
    /// Generic statement naming the weak features
    pub focus_template: String,
    /// Used when nothing else applies
    pub fallback: String,
    /// Contextual rules, applied in order
    pub rules: Vec<KeywordRule>,
}

impl Default for RecommendationRules {
    fn default() -> Self {
        Self {
            worst_features: 3,
            max_actions: 3,
            focus_template: format!(
                "Focus improvements on: {FEATURES_PLACEHOLDER} (cluster average below overall)."
            ),
            fallback: "Maintain the current quality and keep monitoring regularly.".to_string(),
            rules: vec![
                KeywordRule::new(
                    &["wait", "queue", "estimate", "fast", "speed", "time"],
                    "Reduce waiting time: organise the queue flow, show service estimates and add staff at peak hours.",
                ),
                KeywordRule::new(
                    &["clean", "tidy", "wash result"],
                    "Strengthen final QC: a cleanliness checklist before hand-over and a refresher on the detailing SOP.",
                ),
                KeywordRule::new(
                    &["staff", "friendly", "responsive", "attention", "service"],
                    "Coach frontline staff: greeting, needs confirmation and closing script, plus a review of assignments.",
                ),
                KeywordRule::new(
                    &["price", "cost"],
                    "Price transparency: simplify packages, explain the benefits and offer bundles for repeat visits.",
                ),
                KeywordRule::new(
                    &["access", "location", "parking", "comfort"],
                    "Improve access and comfort: clear parking signage and waiting-room facilities (seating, drinks, power outlets).",
                ),
                KeywordRule::new(
                    &["process", "washing"],
                    "Standardise the process: daily audit of each washing stage and documentation of deviations.",
                ),
            ],
        }
    }
}

/// Report wording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// PDF heading
    pub title: String,
    /// Dataset name used when the upload had none
    pub fallback_dataset_name: String,
    /// Closing line pointing readers at the insights view
    pub insights_pointer: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "Clustering Report".to_string(),
            fallback_dataset_name: "dataset.csv".to_string(),
            insights_pointer:
                "Summary: see the Insights page for key traits and recommendations.".to_string(),
        }
    }
}

impl Config {
    /// Parse a JSON document; absent fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}
