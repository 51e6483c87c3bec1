//! Daily and cumulative P&L from the trade table.
//!
//! A trade's P&L is `premium * contracts`. Trades are summed per signal
//! date, dates ascending, and the running total gives the cumulative curve.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::backtest::{Signal, TradeRecord};
use crate::data::LoaderError;

/// P&L for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub pnl: Decimal,
    pub cumulative_pnl: Decimal,
}

/// P&L of a single trade.
///
/// A premium that has no decimal form (NaN, infinite, out of range)
/// contributes zero and is logged.
pub fn trade_pnl(trade: &TradeRecord) -> Decimal {
    let pnl = Decimal::try_from(trade.premium)
        .ok()
        .and_then(|premium| premium.checked_mul(Decimal::from(trade.contracts)));

    match pnl {
        Some(pnl) => pnl,
        None => {
            warn!(
                "{} {} {}: premium {} x {} contracts has no decimal P&L, counted as zero",
                trade.product, trade.date, trade.signal, trade.premium, trade.contracts
            );
            Decimal::ZERO
        }
    }
}

/// Sum trade P&L by date and accumulate, dates ascending.
pub fn daily_pnl(trades: &[TradeRecord]) -> Vec<DailyPnl> {
    let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for trade in trades {
        *by_date.entry(trade.date).or_insert(Decimal::ZERO) += trade_pnl(trade);
    }

    let mut cumulative = Decimal::ZERO;
    by_date
        .into_iter()
        .map(|(date, pnl)| {
            cumulative += pnl;
            DailyPnl {
                date,
                pnl,
                cumulative_pnl: cumulative,
            }
        })
        .collect()
}

/// Write the daily P&L curve as `date,pnl,cumulative_pnl`.
pub fn write_daily_pnl_csv(rows: &[DailyPnl], path: impl AsRef<Path>) -> Result<(), LoaderError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let dates: Vec<String> = rows.iter().map(|r| r.date.to_string()).collect();
    let pnl: Vec<f64> = rows
        .iter()
        .map(|r| f64::try_from(r.pnl).unwrap_or(0.0))
        .collect();
    let cumulative: Vec<f64> = rows
        .iter()
        .map(|r| f64::try_from(r.cumulative_pnl).unwrap_or(0.0))
        .collect();

    let mut df = DataFrame::new(vec![
        Series::new("date".into(), dates).into(),
        Series::new("pnl".into(), pnl).into(),
        Series::new("cumulative_pnl".into(), cumulative).into(),
    ])?;

    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    Ok(())
}

/// Count and summed P&L for one signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalStats {
    pub trades: usize,
    pub pnl: Decimal,
}

/// Aggregate view of a trade table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PnlSummary {
    pub trades: usize,
    pub total_pnl: Decimal,
    pub buy_convexity: SignalStats,
    pub sell_premium: SignalStats,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl PnlSummary {
    pub fn from_trades(trades: &[TradeRecord]) -> Self {
        let mut summary = Self {
            trades: trades.len(),
            ..Default::default()
        };

        for trade in trades {
            let pnl = trade_pnl(trade);
            summary.total_pnl += pnl;

            let stats = match trade.signal {
                Signal::BuyConvexity => &mut summary.buy_convexity,
                Signal::SellPremium => &mut summary.sell_premium,
                Signal::NoSignal => continue,
            };
            stats.trades += 1;
            stats.pnl += pnl;
        }

        summary.first_date = trades.iter().map(|t| t.date).min();
        summary.last_date = trades.iter().map(|t| t.date).max();
        summary
    }

    /// Average P&L per trade.
    pub fn avg_trade_pnl(&self) -> Decimal {
        if self.trades == 0 {
            return Decimal::ZERO;
        }
        self.total_pnl / Decimal::from(self.trades as i64)
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        let range = match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => format!("{} to {}", first, last),
            _ => "no trades".to_string(),
        };
        format!(
            "P&L Summary ({})\n\
             ----------------------------------------\n\
             Trades: {} (BUY_CONVEXITY: {}, SELL_PREMIUM: {})\n\
             Total P&L: {:.2}\n\
             BUY_CONVEXITY P&L: {:.2}\n\
             SELL_PREMIUM P&L: {:.2}\n\
             Avg Trade: {:.4}",
            range,
            self.trades,
            self.buy_convexity.trades,
            self.sell_premium.trades,
            self.total_pnl,
            self.buy_convexity.pnl,
            self.sell_premium.pnl,
            self.avg_trade_pnl(),
        )
    }
}
