//! Price history loader for per-instrument CSV files.
//!
//! Each file needs a date column and a close column (names matched
//! case-insensitively, so both `date,close` and Yahoo-style `Date,Close`
//! work). Every other column is ignored. Rows may come in any order; the
//! resulting `PriceSeries` is sorted by date.
//!
//! Malformed rows are not skipped. An unparseable date, a missing close or
//! a non-positive close aborts the load with the offending 1-based row.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::types::{PriceBar, PriceSeries, SeriesError};

/// Column holding the session date.
pub const DATE_COLUMN: &str = "date";

/// Column holding the closing price.
pub const CLOSE_COLUMN: &str = "close";

/// Date layouts accepted in the date column, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Missing column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("Invalid data in {path} row {row}: {reason}")]
    InvalidData {
        path: String,
        row: usize,
        reason: String,
    },

    #[error("Invalid series in {path}: {source}")]
    Series {
        path: String,
        #[source]
        source: SeriesError,
    },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSV loader for daily close histories.
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    base_dir: Option<PathBuf>,
}

impl DataLoader {
    /// Loader resolving paths as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader resolving relative paths against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Read only the date and close columns of a CSV file.
    pub fn load_dataframe(&self, path: impl AsRef<Path>) -> Result<DataFrame, LoaderError> {
        read_close_frame(&self.resolve(path.as_ref()))
    }

    /// Load a price series from a CSV file.
    pub fn load_series(&self, path: impl AsRef<Path>) -> Result<PriceSeries, LoaderError> {
        let resolved = self.resolve(path.as_ref());
        let df = read_close_frame(&resolved)?;
        let series = dataframe_to_series(&df, &resolved.display().to_string())?;

        debug!(
            "Loaded {} bars from {} ({:?} to {:?})",
            series.len(),
            resolved.display(),
            series.first_date(),
            series.last_date()
        );

        Ok(series)
    }
}

/// Read a CSV file and keep its date and close columns as `date`/`close`.
fn read_close_frame(path: &Path) -> Result<DataFrame, LoaderError> {
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }

    // Infer from every row so integer-looking leading closes cannot pin
    // the column to i64.
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let date_col = find_column(&df, DATE_COLUMN, path)?;
    let close_col = find_column(&df, CLOSE_COLUMN, path)?;

    let selected = df
        .lazy()
        .select([
            col(date_col.as_str())
                .cast(DataType::String)
                .alias(DATE_COLUMN),
            col(close_col.as_str())
                .cast(DataType::Float64)
                .alias(CLOSE_COLUMN),
        ])
        .collect()?;

    Ok(selected)
}

/// Find a column by case-insensitive name, returning its actual name.
fn find_column(df: &DataFrame, wanted: &str, path: &Path) -> Result<String, LoaderError> {
    df.get_column_names()
        .into_iter()
        .find(|name| name.trim().eq_ignore_ascii_case(wanted))
        .map(|name| name.to_string())
        .ok_or_else(|| LoaderError::MissingColumn {
            column: wanted.to_string(),
            path: path.display().to_string(),
        })
}

/// Parse a date cell. Trailing time or timezone parts are ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(raw);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Convert a `date`/`close` DataFrame into a validated `PriceSeries`.
fn dataframe_to_series(df: &DataFrame, path: &str) -> Result<PriceSeries, LoaderError> {
    let dates = df.column(DATE_COLUMN)?.str()?;
    let closes = df.column(CLOSE_COLUMN)?.f64()?;

    let mut bars = Vec::with_capacity(df.height());

    for (idx, (date, close)) in dates.into_iter().zip(closes.into_iter()).enumerate() {
        let row = idx + 1;
        let invalid = |reason: String| LoaderError::InvalidData {
            path: path.to_string(),
            row,
            reason,
        };

        let date = match date {
            Some(raw) => parse_date(raw)
                .ok_or_else(|| invalid(format!("unparseable date '{}'", raw)))?,
            None => return Err(invalid("missing date".to_string())),
        };

        let close = close.ok_or_else(|| invalid("missing or non-numeric close".to_string()))?;
        if !(close.is_finite() && close > 0.0) {
            return Err(invalid(format!("non-positive close {}", close)));
        }

        bars.push(PriceBar::new(date, close));
    }

    PriceSeries::new(bars).map_err(|source| LoaderError::Series {
        path: path.to_string(),
        source,
    })
}
