//! Performance metrics module.
//!
//! Daily and cumulative P&L of the trade table, and per-signal summaries.

pub mod pnl;

pub use pnl::{daily_pnl, trade_pnl, write_daily_pnl_csv, DailyPnl, PnlSummary, SignalStats};
