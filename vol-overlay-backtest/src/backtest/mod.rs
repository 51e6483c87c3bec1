//! Volatility overlay backtest.
//!
//! This module runs the per-bar strategy loop over each instrument:
//! - Synthetic implied vol and IV/RV signal classification
//! - Straddle and strangle pricing on the forward
//! - Delayed fills with premium slippage
//! - Parallel per-instrument driver and trade table output

pub mod engine;
pub mod fill;
pub mod output;
pub mod signal;
pub mod simulator;
pub mod slippage;
pub mod trade;

pub use engine::{
    BacktestConfig, BacktestEngine, BacktestError, BacktestResult, InstrumentSource,
    InstrumentSummary,
};
pub use fill::{DelayBounds, Fill, FillSimulator};
pub use output::{read_trades_csv, write_trades_csv, DEFAULT_TRADES_PATH};
pub use signal::{ImpliedVolDraw, Signal, SignalThresholds};
pub use simulator::{AssetRun, SignalSimulator};
pub use slippage::SlippageModel;
pub use trade::{OptionLeg, OptionStructure, TradeRecord, TRADE_COLUMNS};
