//! Trade table persistence.
//!
//! The trade CSV has one row per trade, header
//! `date,product,signal,spot_entry,spot_fill,iv,rv,premium,contracts`,
//! dates as `YYYY-MM-DD` and signals as their upper-case names.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

use crate::data::{parse_date, LoaderError};

use super::signal::Signal;
use super::trade::{TradeRecord, TRADE_COLUMNS};

/// Default location of the trade table.
pub const DEFAULT_TRADES_PATH: &str = "results/trades.csv";

/// Build the trade DataFrame, columns in output order.
pub fn trades_to_dataframe(trades: &[TradeRecord]) -> Result<DataFrame, LoaderError> {
    let dates: Vec<String> = trades
        .iter()
        .map(|t| t.date.format("%Y-%m-%d").to_string())
        .collect();
    let products: Vec<&str> = trades.iter().map(|t| t.product.as_str()).collect();
    let signals: Vec<&str> = trades.iter().map(|t| t.signal.as_str()).collect();
    let f64_col = |f: fn(&TradeRecord) -> f64| trades.iter().map(f).collect::<Vec<f64>>();
    let contracts: Vec<i32> = trades.iter().map(|t| t.contracts).collect();

    let df = DataFrame::new(vec![
        Series::new(TRADE_COLUMNS[0].into(), dates).into(),
        Series::new(TRADE_COLUMNS[1].into(), products).into(),
        Series::new(TRADE_COLUMNS[2].into(), signals).into(),
        Series::new(TRADE_COLUMNS[3].into(), f64_col(|t| t.spot_entry)).into(),
        Series::new(TRADE_COLUMNS[4].into(), f64_col(|t| t.spot_fill)).into(),
        Series::new(TRADE_COLUMNS[5].into(), f64_col(|t| t.iv)).into(),
        Series::new(TRADE_COLUMNS[6].into(), f64_col(|t| t.rv)).into(),
        Series::new(TRADE_COLUMNS[7].into(), f64_col(|t| t.premium)).into(),
        Series::new(TRADE_COLUMNS[8].into(), contracts).into(),
    ])?;

    Ok(df)
}

/// Write trades to a CSV file, creating parent directories.
pub fn write_trades_csv(trades: &[TradeRecord], path: impl AsRef<Path>) -> Result<(), LoaderError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut df = trades_to_dataframe(trades)?;
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    debug!("Wrote {} trades to {}", trades.len(), path.display());
    Ok(())
}

/// Read a trade CSV written by `write_trades_csv`.
pub fn read_trades_csv(path: impl AsRef<Path>) -> Result<Vec<TradeRecord>, LoaderError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path_str));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let names = df.get_column_names();
    if let Some(missing) = TRADE_COLUMNS
        .iter()
        .find(|c| !names.iter().any(|n| n.as_str() == **c))
    {
        return Err(LoaderError::MissingColumn {
            column: missing.to_string(),
            path: path_str,
        });
    }

    let df = df
        .lazy()
        .select([
            col("date").cast(DataType::String),
            col("product").cast(DataType::String),
            col("signal").cast(DataType::String),
            col("spot_entry").cast(DataType::Float64),
            col("spot_fill").cast(DataType::Float64),
            col("iv").cast(DataType::Float64),
            col("rv").cast(DataType::Float64),
            col("premium").cast(DataType::Float64),
            col("contracts").cast(DataType::Int64),
        ])
        .collect()?;

    let dates = df.column("date")?.str()?;
    let products = df.column("product")?.str()?;
    let signals = df.column("signal")?.str()?;
    let spot_entry = df.column("spot_entry")?.f64()?;
    let spot_fill = df.column("spot_fill")?.f64()?;
    let iv = df.column("iv")?.f64()?;
    let rv = df.column("rv")?.f64()?;
    let premium = df.column("premium")?.f64()?;
    let contracts = df.column("contracts")?.i64()?;

    let mut trades = Vec::with_capacity(df.height());

    for idx in 0..df.height() {
        let row = idx + 1;
        let invalid = |reason: String| LoaderError::InvalidData {
            path: path_str.clone(),
            row,
            reason,
        };
        let number = |value: Option<f64>, column: &str| match value {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(invalid(format!("non-finite {} {}", column, v))),
            None => Err(invalid(format!("missing {}", column))),
        };

        let raw_date = dates.get(idx).unwrap_or_default();
        let date: NaiveDate = parse_date(raw_date)
            .ok_or_else(|| invalid(format!("unparseable date '{}'", raw_date)))?;

        let raw_signal = signals.get(idx).unwrap_or_default();
        let signal = Signal::from_str(raw_signal)
            .filter(|s| s.is_trade())
            .ok_or_else(|| invalid(format!("unknown signal '{}'", raw_signal)))?;

        let count = contracts
            .get(idx)
            .and_then(|c| i32::try_from(c).ok())
            .ok_or_else(|| invalid("missing or out-of-range contracts".to_string()))?;

        trades.push(TradeRecord {
            date,
            product: products.get(idx).unwrap_or_default().to_string(),
            signal,
            spot_entry: number(spot_entry.get(idx), "spot_entry")?,
            spot_fill: number(spot_fill.get(idx), "spot_fill")?,
            iv: number(iv.get(idx), "iv")?,
            rv: number(rv.get(idx), "rv")?,
            premium: number(premium.get(idx), "premium")?,
            contracts: count,
        });
    }

    debug!("Read {} trades from {}", trades.len(), path.display());
    Ok(trades)
}
