//! Tabular survey data: named columns of mixed numeric/text cells

use crate::error::{Error, Result};
use calamine::{open_workbook, Reader, Xlsx};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// A single cell of a survey table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric answer (Likert scores, ages, counts)
    Number(f64),
    /// Free or categorical text answer
    Text(String),
    /// Empty cell
    Missing,
}

impl Value {
    /// Parse a raw cell: blank is missing, anything `f64` accepts is a number
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(x) if x.is_finite() => Value::Number(x),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    /// Whether the cell is empty
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric content, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    /// Total order used for deterministic tie-breaking: numbers, then text, then missing
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Number(_), _) => Ordering::Less,
            (_, Value::Number(_)) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Text(_), Value::Missing) => Ordering::Less,
            (Value::Missing, Value::Text(_)) => Ordering::Greater,
            (Value::Missing, Value::Missing) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Missing => Ok(()),
        }
    }
}

/// Row-major table with named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset, checking that every row matches the header width
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::invalid_data(format!(
                "Row {} has {} cells, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Load a survey export: `.xlsx` workbooks by extension, anything else as CSV
    /// (comma separated, falling back to semicolons)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_xlsx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("xlsx"));
        if is_xlsx {
            return Self::from_xlsx_path(path);
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_csv_str(&content)
    }

    /// Load the first worksheet of an Excel workbook; the first row holds the column names
    pub fn from_xlsx_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path.as_ref())?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::invalid_data("Workbook has no worksheets"))??;

        let mut rows = range.rows();
        let columns: Vec<String> = rows
            .next()
            .ok_or_else(|| Error::invalid_data("Worksheet is empty"))?
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();
        let rows: Vec<Vec<Value>> = rows
            .map(|row| row.iter().map(|cell| Value::parse(&cell.to_string())).collect())
            .collect();

        debug!(rows = rows.len(), columns = columns.len(), "Read worksheet");
        Self::new(columns, rows)
    }

    /// Load CSV data from any reader
    pub fn from_csv_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::from_csv_str(&content)
    }

    /// Parse CSV text, preferring `,` and retrying with `;` when that parse is degenerate
    pub fn from_csv_str(content: &str) -> Result<Self> {
        match Self::parse_delimited(content, b',') {
            Ok(ds) if ds.n_cols() > 1 => Ok(ds),
            comma => match Self::parse_delimited(content, b';') {
                Ok(ds) if ds.n_cols() > 1 => {
                    debug!(columns = ds.n_cols(), "Parsed CSV with ';' delimiter");
                    Ok(ds)
                }
                _ => comma,
            },
        }
    }

    fn parse_delimited(content: &str, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(false)
            .from_reader(content.as_bytes());

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Value::parse).collect());
        }

        Self::new(columns, rows)
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over the cells of one column
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// A column is numeric when every present cell is a number
    pub fn is_numeric_column(&self, idx: usize) -> bool {
        self.column(idx)
            .all(|v| matches!(v, Value::Number(_) | Value::Missing))
    }

    /// Keep the requested columns that exist, in the requested order
    pub fn select(&self, names: &[String]) -> Self {
        let indices: Vec<usize> = names
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();

        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Self { columns, rows }
    }

    /// Whether any cell is missing
    pub fn has_missing(&self) -> bool {
        self.rows.iter().flatten().any(Value::is_missing)
    }
}
