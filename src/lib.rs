//! # K-Means survey segmentation
//!
//! This crate clusters respondents of a tabular survey with K-Means and turns
//! the result into insight reports.
//!
//! ## Features
//!
//! - **Preprocessing**: missing-value imputation, label or one-hot encoding,
//!   standard or min-max scaling with invertible scalers
//! - **Elbow selection**: WCSS sweep with a suggested k fused from three
//!   knee heuristics
//! - **K-Means**: k-means++ or random seeding, Lloyd iteration, parallel
//!   restarts via Rayon, deterministic for a fixed seed
//! - **Evaluation**: Davies-Bouldin index, silhouette score and silhouette curve
//! - **Profiling**: per-cluster averages and modes, feature importance and
//!   keyword-driven recommendations
//! - **Reports**: structured summary, SVG charts, PDF and CSV downloads
//!
//! ## Example
//!
//! ```rust
//! use kinsight::{Config, Dataset, Session, TrainRequest, UploadRequest};
//!
//! let csv = "q1,q2\n1,5\n2,4\n1,5\n5,1\n4,2\n5,1\n";
//! let dataset = Dataset::from_csv_str(csv)?;
//!
//! let mut session = Session::new(Config::default());
//! session.load_dataset(
//!     Some("survey.csv"),
//!     &dataset,
//!     UploadRequest {
//!         features: vec!["q1".into(), "q2".into()],
//!         ..Default::default()
//!     },
//! )?;
//!
//! let trained = session.train(TrainRequest {
//!     k: Some(2),
//!     ..Default::default()
//! })?;
//! assert_eq!(trained.k, 2);
//!
//! let summary = session.report_summary();
//! println!("{}", summary.narrative);
//! # Ok::<(), kinsight::Error>(())
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod dataset;
pub mod distance;
pub mod elbow;
pub mod error;
pub mod initialization;
pub mod kmeans;
pub mod metrics;
pub mod plot;
pub mod preprocess;
pub mod profile;
pub mod report;
pub mod session;
pub mod trainer;
pub mod utils;

pub use config::{Config, KMeansDefaults, KeywordRule, RecommendationRules, ReportSettings};
pub use dataset::{Dataset, Value};
pub use distance::{Euclidean, Metric, SquaredEuclidean};
pub use elbow::{compute_elbow, ElbowCandidates, ElbowResult};
pub use error::{Error, ErrorKind, Result};
pub use initialization::InitMethod;
pub use kmeans::{KMeans, KMeansResult};
pub use metrics::{davies_bouldin, silhouette_curve, silhouette_score, SilhouetteCurve};
pub use preprocess::{preprocess, Encoding, MissingPolicy, PreprocessConfig, Preprocessed, Scaling};
pub use profile::{ClusterProfile, DisplayNames, FeatureProfile};
pub use report::{ReportFile, ReportFormat, ReportSummary};
pub use session::{
    ElbowRequest, SilhouetteCurveRequest, Session, SessionStore, TrainRequest, UploadRequest,
};
pub use trainer::{train, TrainParams, TrainedModel};

/// Re-export commonly used types from ndarray
pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_functionality() {
        let _init_method = InitMethod::default();
        let _session = Session::new(Config::default());
    }
}
