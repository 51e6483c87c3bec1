//! Volatility analytics.

pub mod realized_vol;

pub use realized_vol::RealizedVolEstimator;
