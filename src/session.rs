//! Per-user clustering session
//!
//! A [`Session`] owns the active dataset, its preprocessed feature matrix and
//! every artefact derived from it. Loading a new dataset invalidates the
//! suggested k, model, profile and cached metrics, so elbow, training and
//! evaluation always share one feature space.
//!
//! [`SessionStore`] keeps independent sessions keyed by an opaque id, each
//! behind its own mutex.

use crate::config::Config;
use crate::dataset::Dataset;
use crate::elbow::compute_elbow;
use crate::error::{Error, Result};
use crate::initialization::InitMethod;
use crate::metrics::{davies_bouldin, silhouette_curve, silhouette_score};
use crate::preprocess::{preprocess, PreprocessConfig, Preprocessed};
use crate::profile::{ClusterProfile, DisplayNames};
use crate::report::{
    summarize, timestamp, Metrics, ReportDocument, ReportFile, ReportFormat, ReportSummary,
    SummaryInput,
};
use crate::trainer::{train, TrainParams, TrainedModel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upload options
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadRequest {
    /// Columns used as features; unknown names are skipped
    pub features: Vec<String>,
    /// User-facing labels for features
    pub display_names: DisplayNames,
    /// Preprocessing; the configured default when absent
    pub preprocessing: Option<PreprocessConfig>,
}

/// Shape of the preprocessed feature matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Samples after missing-value handling
    pub rows: usize,
    /// Features after encoding
    pub cols: usize,
    /// Output feature names
    pub feature_names: Vec<String>,
}

/// Elbow sweep range; configured defaults fill the gaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElbowRequest {
    /// Smallest k
    pub k_min: Option<usize>,
    /// Largest k
    pub k_max: Option<usize>,
}

/// Elbow sweep outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElbowResponse {
    /// k values swept
    pub ks: Vec<usize>,
    /// WCSS per k
    pub wcss: Vec<f64>,
    /// Suggested k
    pub suggested_k: Option<usize>,
    /// WCSS at the suggested k
    pub wcss_at_k: Option<f64>,
    /// Elbow chart
    pub plot_svg: String,
}

/// Training hyperparameters; configured defaults fill the gaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainRequest {
    /// Number of clusters; the elbow suggestion, then the default k, when absent
    pub k: Option<usize>,
    /// Seeding strategy
    pub init: Option<InitMethod>,
    /// Restarts
    pub n_init: Option<usize>,
    /// Iteration cap
    pub max_iter: Option<usize>,
    /// Random seed
    pub random_state: Option<u64>,
}

/// Members of one cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCount {
    /// Cluster id
    pub cluster: usize,
    /// Number of members
    pub count: usize,
}

/// One feature's centroid coordinate in every cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidRow {
    /// Feature name
    pub feature: String,
    /// Value per cluster id, preprocessed space
    pub values: Vec<f64>,
}

/// Training outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResponse {
    /// Clusters actually used
    pub k: usize,
    /// WCSS
    pub inertia: f64,
    /// Mean silhouette coefficient, when defined
    pub silhouette: Option<f64>,
    /// Clusters that received members, ascending
    pub counts: Vec<ClusterCount>,
    /// Feature x cluster centroid grid
    pub centroids: Vec<CentroidRow>,
}

/// Davies-Bouldin index of the current model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbiResponse {
    /// Index value
    pub dbi: f64,
}

/// Silhouette of the current model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilhouetteResponse {
    /// `None` when undefined
    pub score: Option<f64>,
}

/// Silhouette curve range and hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SilhouetteCurveRequest {
    /// Smallest k
    pub k_min: Option<usize>,
    /// Largest k
    pub k_max: Option<usize>,
    /// Seeding strategy
    pub init: Option<InitMethod>,
    /// Restarts
    pub n_init: Option<usize>,
    /// Iteration cap
    pub max_iter: Option<usize>,
    /// Random seed
    pub random_state: Option<u64>,
}

/// Silhouette score per k
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilhouetteCurveResponse {
    /// k values
    pub ks: Vec<usize>,
    /// Score per k, `None` where undefined
    pub scores: Vec<Option<f64>>,
    /// Silhouette chart
    pub plot_svg: String,
}

/// State of one user's clustering workflow
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: Config,
    dataset_name: Option<String>,
    display_names: DisplayNames,
    data: Option<Preprocessed>,
    suggested_k: Option<usize>,
    model: Option<TrainedModel>,
    profile: Option<ClusterProfile>,
    dbi: Option<f64>,
    silhouette: Option<f64>,
    generated_at: Option<String>,
}

impl Session {
    /// Empty session using `config`
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Preprocessed active dataset
    pub fn data(&self) -> Option<&Preprocessed> {
        self.data.as_ref()
    }

    /// Current model
    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Last elbow suggestion
    pub fn suggested_k(&self) -> Option<usize> {
        self.suggested_k
    }

    /// Drop the dataset and everything derived from it
    pub fn reset(&mut self) {
        self.dataset_name = None;
        self.display_names.clear();
        self.data = None;
        self.invalidate();
        debug!("Session reset");
    }

    fn invalidate(&mut self) {
        self.suggested_k = None;
        self.model = None;
        self.profile = None;
        self.dbi = None;
        self.silhouette = None;
        self.generated_at = None;
    }

    fn require_data(&self) -> Result<&Preprocessed> {
        self.data.as_ref().ok_or(Error::NoDataset)
    }

    fn require_model(&self) -> Result<(&Preprocessed, &TrainedModel)> {
        let data = self.require_data()?;
        let model = self.model.as_ref().ok_or(Error::NoModel)?;
        Ok((data, model))
    }

    /// Preprocess `dataset` and make it the active dataset
    ///
    /// Derived state from a previous dataset is discarded even when
    /// preprocessing fails.
    pub fn load_dataset(
        &mut self,
        name: Option<&str>,
        dataset: &Dataset,
        request: UploadRequest,
    ) -> Result<UploadResponse> {
        self.reset();

        let config = request
            .preprocessing
            .unwrap_or(self.config.preprocessing);
        let data = preprocess(dataset, &request.features, &config)?;

        let response = UploadResponse {
            rows: data.n_samples(),
            cols: data.n_features(),
            feature_names: data.feature_names.clone(),
        };
        info!(
            dataset = name.unwrap_or("<unnamed>"),
            rows = response.rows,
            cols = response.cols,
            "Loaded dataset"
        );

        self.dataset_name = name.map(str::to_string);
        self.display_names = request.display_names;
        self.data = Some(data);
        Ok(response)
    }

    /// Sweep k and store the suggested k
    pub fn elbow(&mut self, request: ElbowRequest) -> Result<ElbowResponse> {
        let data = self.require_data()?;
        let k_min = request.k_min.unwrap_or(self.config.elbow.k_min);
        let k_max = request.k_max.unwrap_or(self.config.elbow.k_max);

        let result = compute_elbow(data.matrix.view(), k_min, k_max, &self.config.kmeans)?;
        let plot_svg = result.plot_svg()?;

        info!(k_min, k_max, suggested_k = ?result.suggested_k, "Elbow sweep finished");
        self.suggested_k = result.suggested_k;

        Ok(ElbowResponse {
            ks: result.ks,
            wcss: result.wcss,
            suggested_k: result.suggested_k,
            wcss_at_k: result.wcss_at_k,
            plot_svg,
        })
    }

    /// Train a model and make it current
    ///
    /// On failure the previous model stays active.
    pub fn train(&mut self, request: TrainRequest) -> Result<TrainResponse> {
        let data = self.require_data()?;
        let defaults = &self.config.kmeans;

        let k = request
            .k
            .or(self.suggested_k)
            .unwrap_or(self.config.default_k.0);
        let params = TrainParams {
            init: request.init.unwrap_or(defaults.init),
            n_init: request.n_init.unwrap_or(defaults.n_init),
            max_iter: request.max_iter.unwrap_or(defaults.max_iter),
            random_state: request.random_state.unwrap_or(defaults.random_state),
            ..TrainParams::new(k, defaults)
        };

        let model = train(data.matrix.view(), &params)?;
        let silhouette = silhouette_score(data.matrix.view(), &model.labels);
        let profile = ClusterProfile::build(&model, data);

        let counts = model
            .cluster_sizes()
            .into_iter()
            .enumerate()
            .filter(|&(_, count)| count > 0)
            .map(|(cluster, count)| ClusterCount { cluster, count })
            .collect();
        let centroids = data
            .feature_names
            .iter()
            .enumerate()
            .map(|(j, feature)| CentroidRow {
                feature: feature.clone(),
                values: model.centroids.column(j).to_vec(),
            })
            .collect();

        let response = TrainResponse {
            k: model.k,
            inertia: model.inertia,
            silhouette,
            counts,
            centroids,
        };

        self.model = Some(model);
        self.profile = Some(profile);
        self.silhouette = silhouette;
        self.dbi = None;
        self.generated_at = Some(timestamp());
        Ok(response)
    }

    /// Davies-Bouldin index of the current model, cached for reports
    pub fn dbi(&mut self) -> Result<DbiResponse> {
        let (data, model) = self.require_model()?;
        let dbi = davies_bouldin(data.matrix.view(), &model.labels)?;
        self.dbi = Some(dbi);
        Ok(DbiResponse { dbi })
    }

    /// Silhouette of the current model
    pub fn silhouette(&self) -> Result<SilhouetteResponse> {
        let (data, model) = self.require_model()?;
        Ok(SilhouetteResponse {
            score: silhouette_score(data.matrix.view(), &model.labels),
        })
    }

    /// Silhouette score across a k range on the active dataset
    pub fn silhouette_curve(&self, request: SilhouetteCurveRequest) -> Result<SilhouetteCurveResponse> {
        let data = self.require_data()?;
        let mut defaults = self.config.kmeans.clone();
        if let Some(init) = request.init {
            defaults.init = init;
        }
        if let Some(n_init) = request.n_init {
            defaults.n_init = n_init;
        }
        if let Some(max_iter) = request.max_iter {
            defaults.max_iter = max_iter;
        }
        if let Some(seed) = request.random_state {
            defaults.random_state = seed;
        }

        let curve = silhouette_curve(
            data.matrix.view(),
            request.k_min.unwrap_or(self.config.elbow.k_min),
            request.k_max.unwrap_or(self.config.elbow.k_max),
            &defaults,
        )?;
        let plot_svg = curve.plot_svg()?;

        Ok(SilhouetteCurveResponse {
            ks: curve.ks,
            scores: curve.scores,
            plot_svg,
        })
    }

    /// Profile of the current model
    pub fn cluster_profile(&self) -> Result<&ClusterProfile> {
        self.require_model()?;
        self.profile.as_ref().ok_or(Error::NoModel)
    }

    /// Metrics for the current model, computing and caching missing ones
    fn resolve_metrics(&mut self) -> Option<Metrics> {
        let (data, model) = self.require_model().ok()?;
        let dbi = match self.dbi {
            Some(dbi) => Some(dbi),
            None => match davies_bouldin(data.matrix.view(), &model.labels) {
                Ok(dbi) => Some(dbi),
                Err(e) => {
                    warn!(error = %e, "Davies-Bouldin index unavailable");
                    None
                }
            },
        };
        let silhouette = self
            .silhouette
            .or_else(|| silhouette_score(data.matrix.view(), &model.labels));
        let metrics = Metrics {
            wcss: model.inertia,
            dbi,
            silhouette,
        };

        self.dbi = dbi;
        self.silhouette = silhouette;
        Some(metrics)
    }

    /// Insight summary; empty before any model is trained
    pub fn report_summary(&mut self) -> ReportSummary {
        let Some(metrics) = self.resolve_metrics() else {
            return ReportSummary::empty();
        };
        let (Some(data), Some(model)) = (self.data.as_ref(), self.model.as_ref()) else {
            return ReportSummary::empty();
        };

        summarize(SummaryInput {
            dataset: self
                .dataset_name
                .as_deref()
                .unwrap_or(&self.config.report.fallback_dataset_name),
            data: data.matrix.view(),
            feature_names: &data.feature_names,
            display_names: &self.display_names,
            rules: &self.config.recommendations,
            model,
            metrics,
            generated_at: self.generated_at.clone().unwrap_or_else(timestamp),
        })
    }

    /// Render the report as a `pdf` or `csv` file
    pub fn report_download(&self, format: &str) -> Result<ReportFile> {
        let (_, model) = self.require_model()?;
        let format: ReportFormat = format.parse()?;
        let metrics = Metrics {
            wcss: model.inertia,
            dbi: self.dbi,
            silhouette: self.silhouette,
        };
        let document = ReportDocument::new(
            &self.config.report,
            self.dataset_name.as_deref(),
            model,
            metrics,
        );
        info!(%format, k = model.k, "Rendering report");
        document.render(format)
    }
}

/// Sessions keyed by id
#[derive(Debug, Default)]
pub struct SessionStore {
    config: Config,
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    /// Store whose new sessions use `config`
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open a new empty session
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .lock()
            .insert(id, Arc::new(Mutex::new(Session::new(self.config.clone()))));
        debug!(%id, "Created session");
        id
    }

    /// Run `f` with exclusive access to session `id`
    ///
    /// Only that session is locked while `f` runs.
    pub fn with_session<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let session = self.sessions.lock().get(&id).cloned()?;
        let mut guard = session.lock();
        Some(f(&mut guard))
    }

    /// Close session `id`; returns whether it existed
    pub fn remove(&self, id: Uuid) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no sessions are open
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
