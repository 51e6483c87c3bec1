pub mod analytics;
pub mod backtest;
pub mod data;
pub mod metrics;
pub mod pricing;
pub mod risk;

// Re-export commonly used types
pub use analytics::RealizedVolEstimator;
pub use backtest::{
    BacktestConfig, BacktestEngine, BacktestError, BacktestResult, InstrumentSource, Signal,
    SignalSimulator, SlippageModel, TradeRecord,
};
pub use data::{DataLoader, LoaderError, OptionType, PriceBar, PriceSeries};
pub use metrics::{DailyPnl, PnlSummary};
pub use risk::{ContractSpecs, PositionSizer, SizingError};
