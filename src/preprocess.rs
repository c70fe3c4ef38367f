//! Preprocessing of survey tables into a numeric feature matrix
//!
//! The pipeline runs in three fixed stages:
//!
//! 1. missing-value handling ([`MissingPolicy`]) on the selected columns,
//! 2. categorical encoding ([`Encoding`]) into numeric columns,
//! 3. column scaling ([`Scaling`]), keeping the fitted [`Scaler`] so that
//!    centroids can later be mapped back to the original scale.
//!
//! The resulting [`Preprocessed`] bundle is what the elbow sweep, training and
//! evaluation all consume, so every step sees the same feature space.

use crate::dataset::{Dataset, Value};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Separator between a source column and its category in one-hot feature names
pub const ONEHOT_SEPARATOR: &str = "__";

/// How missing cells are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MissingPolicy {
    /// Leave gaps in place
    None,
    /// Remove rows with any missing selected feature
    Drop,
    /// Fill numeric columns with their mean, text columns with ""
    Mean,
    /// Fill numeric columns with their median, text columns with ""
    Median,
}

/// How non-numeric columns become numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoding {
    /// One integer code per distinct category
    Label,
    /// One 0/1 indicator column per distinct category
    OneHot,
}

/// How numeric columns are rescaled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scaling {
    /// No rescaling
    None,
    /// Zero mean, unit variance
    Standard,
    /// Rescale into [0, 1]
    MinMax,
}

macro_rules! policy_strings {
    ($ty:ident, $field:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Canonical lowercase name
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(Error::unknown_policy($field, s)),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = Error;

            fn try_from(s: String) -> Result<Self> {
                s.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> String {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

policy_strings!(MissingPolicy, "missing", {
    None => "none",
    Drop => "drop",
    Mean => "mean",
    Median => "median",
});

policy_strings!(Encoding, "encoding", {
    Label => "label",
    OneHot => "onehot",
});

policy_strings!(Scaling, "scaling", {
    None => "none",
    Standard => "standard",
    MinMax => "minmax",
});

/// The three preprocessing choices for a dataset session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Missing-value policy
    pub missing: MissingPolicy,
    /// Categorical encoding
    pub encoding: Encoding,
    /// Numeric scaling
    pub scaling: Scaling,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            missing: MissingPolicy::None,
            encoding: Encoding::OneHot,
            scaling: Scaling::None,
        }
    }
}

impl PreprocessConfig {
    /// Create a config from its three policies
    pub fn new(missing: MissingPolicy, encoding: Encoding, scaling: Scaling) -> Self {
        Self {
            missing,
            encoding,
            scaling,
        }
    }

    /// Parse a config from raw option strings, rejecting unknown values
    pub fn parse(missing: &str, encoding: &str, scaling: &str) -> Result<Self> {
        Ok(Self {
            missing: missing.parse()?,
            encoding: encoding.parse()?,
            scaling: scaling.parse()?,
        })
    }
}

/// Fitted column scaler, retained to invert centroids
#[derive(Debug, Clone, PartialEq)]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard {
        /// Column means
        mean: Array1<f64>,
        /// Column standard deviations (1 for constant columns)
        scale: Array1<f64>,
    },
    /// `(x - min) / range`
    MinMax {
        /// Column minima
        min: Array1<f64>,
        /// Column ranges (1 for constant columns)
        range: Array1<f64>,
    },
}

impl Scaler {
    /// Fit a scaler of the requested kind; `Scaling::None` yields no scaler
    pub fn fit(scaling: Scaling, data: ArrayView2<f64>) -> Option<Self> {
        match scaling {
            Scaling::None => None,
            Scaling::Standard => {
                let n = data.nrows().max(1) as f64;
                let mean = data.sum_axis(Axis(0)) / n;
                let mut scale = Array1::zeros(data.ncols());
                for (j, column) in data.axis_iter(Axis(1)).enumerate() {
                    let var = column.iter().map(|x| (x - mean[j]).powi(2)).sum::<f64>() / n;
                    scale[j] = non_degenerate(var.sqrt(), mean[j]);
                }
                Some(Scaler::Standard { mean, scale })
            }
            Scaling::MinMax => {
                let mut min = Array1::zeros(data.ncols());
                let mut range = Array1::zeros(data.ncols());
                for (j, column) in data.axis_iter(Axis(1)).enumerate() {
                    let lo = column.iter().copied().fold(f64::INFINITY, f64::min);
                    let hi = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    let lo = if lo.is_finite() { lo } else { 0.0 };
                    min[j] = lo;
                    range[j] = non_degenerate(hi - lo, lo);
                }
                Some(Scaler::MinMax { min, range })
            }
        }
    }

    /// Apply the scaling to data in the original feature space
    pub fn transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        let (offset, divisor) = self.parameters();
        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            row -= offset;
            row /= divisor;
        }
        out
    }

    /// Map scaled data (for example centroids) back to the original feature space
    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        let (offset, divisor) = self.parameters();
        let mut out = data.to_owned();
        for mut row in out.rows_mut() {
            row *= divisor;
            row += offset;
        }
        out
    }

    fn parameters(&self) -> (&Array1<f64>, &Array1<f64>) {
        match self {
            Scaler::Standard { mean, scale } => (mean, scale),
            Scaler::MinMax { min, range } => (min, range),
        }
    }
}

fn non_degenerate(spread: f64, reference: f64) -> f64 {
    if !spread.is_finite() || spread <= 1e-12 * reference.abs().max(1.0) {
        1.0
    } else {
        spread
    }
}

/// Output of preprocessing: the feature matrix plus everything needed to interpret it
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Samples x features, after encoding and scaling
    pub matrix: Array2<f64>,
    /// Output feature names (one-hot columns are `<column>__<category>`)
    pub feature_names: Vec<String>,
    /// For each output feature, the index of its source column in `original`
    pub feature_sources: Vec<usize>,
    /// Fitted scaler, when scaling was requested
    pub scaler: Option<Scaler>,
    /// Selected columns after missing-value handling, before encoding (row-aligned with `matrix`)
    pub original: Dataset,
    /// The config that produced this bundle
    pub config: PreprocessConfig,
}

impl Preprocessed {
    /// Number of samples
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of output features
    pub fn n_features(&self) -> usize {
        self.matrix.ncols()
    }
}

/// Select `features` from `dataset` and run the full preprocessing pipeline
pub fn preprocess(
    dataset: &Dataset,
    features: &[String],
    config: &PreprocessConfig,
) -> Result<Preprocessed> {
    let selected = dataset.select(features);
    if selected.n_cols() == 0 {
        return Err(Error::invalid_data(
            "None of the requested feature columns exist in the dataset",
        ));
    }

    let original = apply_missing(&selected, config.missing)?;
    let (raw, feature_names, feature_sources) = encode(&original, config.encoding);
    let scaler = Scaler::fit(config.scaling, raw.view());
    let matrix = match &scaler {
        Some(s) => s.transform(raw.view()),
        None => raw,
    };

    debug!(
        rows = matrix.nrows(),
        features = matrix.ncols(),
        missing = %config.missing,
        encoding = %config.encoding,
        scaling = %config.scaling,
        "Preprocessed dataset"
    );

    Ok(Preprocessed {
        matrix,
        feature_names,
        feature_sources,
        scaler,
        original,
        config: *config,
    })
}

/// Apply a missing-value policy to every column of `data`
pub fn apply_missing(data: &Dataset, policy: MissingPolicy) -> Result<Dataset> {
    match policy {
        MissingPolicy::None => Ok(data.clone()),
        MissingPolicy::Drop => {
            let rows = data
                .rows()
                .iter()
                .filter(|row| !row.iter().any(Value::is_missing))
                .cloned()
                .collect();
            Dataset::new(data.columns().to_vec(), rows)
        }
        MissingPolicy::Mean | MissingPolicy::Median => {
            let fills: Vec<Value> = (0..data.n_cols())
                .map(|j| {
                    if data.is_numeric_column(j) {
                        let present: Vec<f64> = data.column(j).filter_map(Value::as_f64).collect();
                        let centre = if policy == MissingPolicy::Mean {
                            mean(&present)
                        } else {
                            median(&present)
                        };
                        centre.map_or(Value::Missing, Value::Number)
                    } else {
                        Value::Text(String::new())
                    }
                })
                .collect();

            let rows = data
                .rows()
                .iter()
                .map(|row| {
                    row.iter()
                        .zip(&fills)
                        .map(|(v, fill)| if v.is_missing() { fill.clone() } else { v.clone() })
                        .collect()
                })
                .collect();
            Dataset::new(data.columns().to_vec(), rows)
        }
    }
}

/// Encode every column into numeric feature columns
///
/// Returns the raw (unscaled) matrix, output feature names and the source column of each feature.
pub fn encode(data: &Dataset, encoding: Encoding) -> (Array2<f64>, Vec<String>, Vec<usize>) {
    let mut columns: Vec<Vec<f64>> = Vec::new();
    let mut names = Vec::new();
    let mut sources = Vec::new();

    for (j, name) in data.columns().iter().enumerate() {
        if data.is_numeric_column(j) {
            columns.push(data.column(j).map(|v| v.as_f64().unwrap_or(f64::NAN)).collect());
            names.push(name.clone());
            sources.push(j);
            continue;
        }

        let categories: Vec<String> = data
            .column(j)
            .filter(|v| !v.is_missing())
            .map(|v| v.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        match encoding {
            Encoding::Label => {
                let codes = data
                    .column(j)
                    .map(|v| match v {
                        Value::Missing => -1.0,
                        other => {
                            let key = other.to_string();
                            categories
                                .binary_search(&key)
                                .map_or(-1.0, |code| code as f64)
                        }
                    })
                    .collect();
                columns.push(codes);
                names.push(name.clone());
                sources.push(j);
            }
            Encoding::OneHot => {
                for category in &categories {
                    let indicator = data
                        .column(j)
                        .map(|v| {
                            if !v.is_missing() && v.to_string() == *category {
                                1.0
                            } else {
                                0.0
                            }
                        })
                        .collect();
                    columns.push(indicator);
                    names.push(format!("{name}{ONEHOT_SEPARATOR}{category}"));
                    sources.push(j);
                }
            }
        }
    }

    let matrix = Array2::from_shape_fn((data.n_rows(), columns.len()), |(i, j)| columns[j][i]);
    (matrix, names, sources)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey() -> Dataset {
        Dataset::from_csv_str(
            "speed,clean,visit\n\
             5,4,Weekly\n\
             ,2,Monthly\n\
             1,,Weekly\n\
             3,5,\n",
        )
        .unwrap()
    }

    fn all_columns() -> Vec<String> {
        vec!["speed".into(), "clean".into(), "visit".into()]
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("MinMax".parse::<Scaling>().unwrap(), Scaling::MinMax);
        assert_eq!("onehot".parse::<Encoding>().unwrap(), Encoding::OneHot);
        assert_eq!(" median ".parse::<MissingPolicy>().unwrap(), MissingPolicy::Median);
        assert!(matches!(
            "robust".parse::<Scaling>(),
            Err(Error::UnknownPolicy { field: "scaling", .. })
        ));
        assert!(PreprocessConfig::parse("drop", "label", "zscore").is_err());
    }

    #[test]
    fn test_config_serde_rejects_unknown_policy() {
        let ok: PreprocessConfig =
            serde_json::from_str(r#"{"missing":"drop","encoding":"label","scaling":"standard"}"#)
                .unwrap();
        assert_eq!(ok.missing, MissingPolicy::Drop);

        let bad = serde_json::from_str::<PreprocessConfig>(r#"{"missing":"interpolate"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_drop_missing() {
        let out = apply_missing(&survey(), MissingPolicy::Drop).unwrap();
        assert_eq!(out.n_rows(), 1);
        assert!(!out.has_missing());
    }

    #[test]
    fn test_mean_and_median_fill() {
        let out = apply_missing(&survey(), MissingPolicy::Mean).unwrap();
        assert_eq!(out.rows()[1][0], Value::Number(3.0));
        assert_eq!(out.rows()[2][1], Value::Number(11.0 / 3.0));
        assert_eq!(out.rows()[3][2], Value::Text(String::new()));

        let out = apply_missing(&survey(), MissingPolicy::Median).unwrap();
        assert_eq!(out.rows()[1][0], Value::Number(3.0));
        assert_eq!(out.rows()[2][1], Value::Number(4.0));
    }

    #[test]
    fn test_label_encoding() {
        let data = apply_missing(&survey(), MissingPolicy::Median).unwrap();
        let (matrix, names, sources) = encode(&data, Encoding::Label);
        assert_eq!(names, all_columns());
        assert_eq!(sources, vec![0, 1, 2]);
        // categories sorted: "", "Monthly", "Weekly"
        assert_eq!(matrix.column(2).to_vec(), vec![2.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_onehot_encoding() {
        let data = apply_missing(&survey(), MissingPolicy::Mean).unwrap();
        let (matrix, names, sources) = encode(&data, Encoding::OneHot);
        assert_eq!(
            names,
            vec!["speed", "clean", "visit__", "visit__Monthly", "visit__Weekly"]
        );
        assert_eq!(sources, vec![0, 1, 2, 2, 2]);
        for row in matrix.rows() {
            let total: f64 = row.iter().skip(2).sum();
            assert_eq!(total, 1.0);
        }
    }

    #[test]
    fn test_standard_scaling_roundtrip() {
        let data = ndarray::array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = Scaler::fit(Scaling::Standard, data.view()).unwrap();
        let scaled = scaler.transform(data.view());

        let col = scaled.column(0);
        assert!(col.mean().unwrap().abs() < 1e-12);
        let var = col.iter().map(|x| x * x).sum::<f64>() / 3.0;
        assert!((var - 1.0).abs() < 1e-12);
        // constant column maps to zero rather than NaN
        assert!(scaled.column(1).iter().all(|&x| x == 0.0));

        let back = scaler.inverse_transform(scaled.view());
        for (a, b) in back.iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_minmax_scaling() {
        let data = ndarray::array![[2.0], [4.0], [6.0]];
        let scaler = Scaler::fit(Scaling::MinMax, data.view()).unwrap();
        let scaled = scaler.transform(data.view());
        assert_eq!(scaled.column(0).to_vec(), vec![0.0, 0.5, 1.0]);
        assert!(Scaler::fit(Scaling::None, data.view()).is_none());
    }

    #[test]
    fn test_preprocess_pipeline() {
        let config = PreprocessConfig::new(MissingPolicy::Drop, Encoding::OneHot, Scaling::MinMax);
        let out = preprocess(&survey(), &all_columns(), &config).unwrap();
        assert_eq!(out.n_samples(), 1);
        assert_eq!(out.original.n_rows(), 1);
        assert_eq!(out.feature_names.len(), out.n_features());
        assert!(out.scaler.is_some());
    }

    #[test]
    fn test_preprocess_without_known_columns() {
        let result = preprocess(&survey(), &["nope".to_string()], &PreprocessConfig::default());
        assert!(result.is_err());
    }
}
