//! Report summary and downloadable report files
//!
//! The summary is the structured insight view of the current model: overview,
//! quality metrics, per-cluster traits and recommendations, global feature
//! importance and a distribution chart. Downloads render a short PDF or a
//! per-cluster CSV.

use crate::config::{RecommendationRules, ReportSettings};
use crate::error::{Error, Result};
use crate::plot;
use crate::profile::{display_name, ClusterMeans, DisplayNames, TRAITS_PER_CLUSTER};
use crate::trainer::TrainedModel;
use chrono::Local;
use ndarray::ArrayView2;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Number of features listed in [`ReportSummary::top_features`]
pub const TOP_FEATURES: usize = 10;

// PDF layout in millimetres from the bottom edge
const PAGE_TOP: f32 = 280.0;
const PAGE_BOTTOM: f32 = 15.0;
const TITLE_GAP: f32 = 8.0;
const LINE_STEP: f32 = 5.0;

/// Current local time in the format shown on reports
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M").to_string()
}

/// Dataset and model dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Name of the uploaded dataset
    pub dataset: String,
    /// Samples in the feature matrix
    pub rows: usize,
    /// Features in the feature matrix
    pub cols: usize,
    /// Number of clusters
    pub k: usize,
    /// When the report was generated
    pub generated_at: String,
}

/// Model quality metrics; unavailable values are `None`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Within-cluster sum of squares
    pub wcss: f64,
    /// Davies-Bouldin index
    pub dbi: Option<f64>,
    /// Mean silhouette coefficient
    pub silhouette: Option<f64>,
}

/// One cluster in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Cluster id
    pub id: usize,
    /// Number of members
    pub size: usize,
    /// Fraction of all samples
    pub share: f64,
    /// Display names of the most distinguishing features
    pub traits: Vec<String>,
    /// Recommendation lines
    pub actions: Vec<String>,
}

/// A feature and its importance relative to the most important one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Display name
    pub feature: String,
    /// Between-cluster variance divided by the largest one
    pub importance: f64,
}

/// Structured insight view of the current model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// `None` before any model is trained
    pub overview: Option<Overview>,
    /// `None` before any model is trained
    pub metrics: Option<Metrics>,
    /// Clusters that received members, ascending by id
    pub clusters: Vec<ClusterSummary>,
    /// Most important features, descending
    pub top_features: Vec<FeatureImportance>,
    /// Bar chart of cluster sizes
    pub distribution_svg: Option<String>,
    /// Short description of cluster proportions
    pub narrative: String,
}

impl ReportSummary {
    /// Summary returned when no model exists yet
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Everything [`summarize`] reads
#[derive(Debug, Clone)]
pub struct SummaryInput<'a> {
    /// Dataset name shown in the overview
    pub dataset: &'a str,
    /// Feature matrix the model was trained on
    pub data: ArrayView2<'a, f64>,
    /// Names of the matrix columns
    pub feature_names: &'a [String],
    /// User-facing feature labels
    pub display_names: &'a DisplayNames,
    /// Recommendation keyword table
    pub rules: &'a RecommendationRules,
    /// Current model
    pub model: &'a TrainedModel,
    /// Metrics, already resolved by the caller
    pub metrics: Metrics,
    /// Timestamp for the overview
    pub generated_at: String,
}

/// Build the report summary for a trained model
pub fn summarize(input: SummaryInput<'_>) -> ReportSummary {
    let model = input.model;
    let sizes = model.cluster_sizes();
    let total = model.labels.len();
    let share_of = |size: usize| if total == 0 { 0.0 } else { size as f64 / total as f64 };

    let overview = Overview {
        dataset: input.dataset.to_string(),
        rows: input.data.nrows(),
        cols: input.data.ncols(),
        k: model.k,
        generated_at: input.generated_at,
    };

    let means = ClusterMeans::compute(input.data, &model.labels, input.feature_names);

    let clusters: Vec<ClusterSummary> = means
        .as_ref()
        .map(|m| {
            m.clusters()
                .iter()
                .map(|&id| {
                    let size = sizes.get(id).copied().unwrap_or(0);
                    ClusterSummary {
                        id,
                        size,
                        share: share_of(size),
                        traits: m
                            .traits(id, TRAITS_PER_CLUSTER)
                            .iter()
                            .map(|f| display_name(f, input.display_names))
                            .collect(),
                        actions: m.recommendations(id, input.rules, input.display_names),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let top_features = means
        .as_ref()
        .map(|m| {
            let importance = m.feature_importance();
            let scale = match importance.first() {
                Some((_, top)) if *top != 0.0 => *top,
                _ => 1.0,
            };
            importance
                .into_iter()
                .take(TOP_FEATURES)
                .map(|(feature, v)| FeatureImportance {
                    feature: display_name(&feature, input.display_names),
                    importance: v / scale,
                })
                .collect()
        })
        .unwrap_or_default();

    let distribution_svg = match plot::distribution_chart(&sizes) {
        Ok(svg) => Some(svg),
        Err(e) => {
            warn!(error = %e, "Distribution chart failed");
            None
        }
    };

    let narrative = narrative(model.k, total, &clusters);
    debug!(k = model.k, clusters = clusters.len(), "Built report summary");

    ReportSummary {
        overview: Some(overview),
        metrics: Some(input.metrics),
        clusters,
        top_features,
        distribution_svg,
        narrative,
    }
}

/// "The model formed K clusters from N respondents. Proportions: C0 P%, ..."
fn narrative(k: usize, total: usize, clusters: &[ClusterSummary]) -> String {
    if clusters.is_empty() {
        return String::new();
    }
    let proportions: Vec<String> = clusters
        .iter()
        .map(|c| format!("C{} {}%", c.id, (c.share * 100.0).round() as i64))
        .collect();
    format!(
        "The model formed {k} clusters from {total} respondents. Proportions: {}",
        proportions.join(", ")
    )
}

/// Downloadable report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// One-page A4 PDF
    #[default]
    Pdf,
    /// Per-cluster size and share table
    Csv,
}

impl ReportFormat {
    /// Lowercase format name
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Csv => "csv",
        }
    }

    /// MIME type of the rendered file
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Csv => "text/csv",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "csv" => Ok(ReportFormat::Csv),
            _ => Err(Error::unsupported_format(s)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered report ready to be sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    /// Suggested download name
    pub file_name: String,
    /// MIME type
    pub content_type: String,
    /// File content
    pub bytes: Vec<u8>,
}

/// Data rendered into a downloadable report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    /// Heading and wording
    pub settings: ReportSettings,
    /// Dataset name, if one was given on upload
    pub dataset: Option<String>,
    /// Generation timestamp
    pub generated_at: String,
    /// Number of clusters
    pub k: usize,
    /// Restarts used for training
    pub n_init: usize,
    /// Iteration cap used for training
    pub max_iter: usize,
    /// Metrics known at render time
    pub metrics: Metrics,
    /// Members per cluster id in `0..k`
    pub counts: Vec<usize>,
}

impl ReportDocument {
    /// Collect the report data for `model`
    pub fn new(
        settings: &ReportSettings,
        dataset: Option<&str>,
        model: &TrainedModel,
        metrics: Metrics,
    ) -> Self {
        Self {
            settings: settings.clone(),
            dataset: dataset.map(str::to_string),
            generated_at: timestamp(),
            k: model.k,
            n_init: model.params.n_init,
            max_iter: model.params.max_iter,
            metrics,
            counts: model.cluster_sizes(),
        }
    }

    /// Render in the requested format
    pub fn render(&self, format: ReportFormat) -> Result<ReportFile> {
        let bytes = match format {
            ReportFormat::Pdf => self.to_pdf()?,
            ReportFormat::Csv => self.to_csv()?,
        };
        Ok(ReportFile {
            file_name: format!("report.{format}"),
            content_type: format.content_type().to_string(),
            bytes,
        })
    }

    /// `cluster,size,share` for every cluster id, share rounded to 6 places
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let total: usize = self.counts.iter().sum();
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["cluster", "size", "share"])?;
        for (cluster, &size) in self.counts.iter().enumerate() {
            let share = size as f64 / total.max(1) as f64;
            let share = (share * 1e6).round() / 1e6;
            writer.write_record([cluster.to_string(), size.to_string(), share.to_string()])?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::render(e.to_string()))
    }

    /// Text lines of the PDF body, below the title
    pub fn pdf_lines(&self) -> Vec<String> {
        let fmt_opt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
        let mut lines = vec![
            format!("Date: {}", self.generated_at),
            format!(
                "Dataset: {}",
                self.dataset
                    .as_deref()
                    .unwrap_or(&self.settings.fallback_dataset_name)
            ),
            format!(
                "Params: k={}, n_init={}, max_iter={}",
                self.k, self.n_init, self.max_iter
            ),
            format!(
                "Metrics: WCSS={:.2}, Silhouette={}, DBI={}",
                self.metrics.wcss,
                fmt_opt(self.metrics.silhouette),
                fmt_opt(self.metrics.dbi)
            ),
        ];
        lines.extend(
            self.counts
                .iter()
                .enumerate()
                .filter(|(_, &n)| n > 0)
                .map(|(c, n)| format!("Cluster C{c}: {n} respondents")),
        );
        lines.push(self.settings.insights_pointer.clone());
        lines
    }

    /// Body lines laid out onto A4 pages, the first page starting below the title
    fn pdf_pages(&self) -> Vec<Vec<String>> {
        let mut pages = vec![Vec::new()];
        let mut y = PAGE_TOP - TITLE_GAP;
        for line in self.pdf_lines() {
            if y < PAGE_BOTTOM {
                pages.push(Vec::new());
                y = PAGE_TOP;
            }
            if let Some(page) = pages.last_mut() {
                page.push(line);
            }
            y -= LINE_STEP;
        }
        pages
    }

    /// A4 pages in the built-in Helvetica fonts
    pub fn to_pdf(&self) -> Result<Vec<u8>> {
        let pdf_error = |e: printpdf::Error| Error::render(e.to_string());

        let (doc, page, layer) =
            PdfDocument::new(&self.settings.title, Mm(210.0), Mm(297.0), "Report");
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?;
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?;

        let left = Mm(18.0);
        let mut current = doc.get_page(page).get_layer(layer);
        current.use_text(self.settings.title.clone(), 14.0, left, Mm(PAGE_TOP), &bold);

        for (i, lines) in self.pdf_pages().into_iter().enumerate() {
            let mut y = PAGE_TOP;
            if i == 0 {
                y -= TITLE_GAP;
            } else {
                let (page, layer) = doc.add_page(Mm(210.0), Mm(297.0), "Report");
                current = doc.get_page(page).get_layer(layer);
            }
            for line in lines {
                current.use_text(line, 10.0, left, Mm(y), &regular);
                y -= LINE_STEP;
            }
        }

        doc.save_to_bytes().map_err(pdf_error)
    }
}
