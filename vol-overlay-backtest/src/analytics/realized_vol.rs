//! Realized volatility from daily closes.
//!
//! Annualized close-to-close volatility over a trailing window of
//! log-returns, using the population standard deviation:
//!
//! rv = stdev(ln(p[i] / p[i-1]) over the last `window` returns) * sqrt(annualization)
//!
//! Fewer than two returns in the window gives no estimate. The caller treats
//! that as "no signal", not as an error.

use serde::{Deserialize, Serialize};

/// Default lookback in returns.
pub const DEFAULT_WINDOW: usize = 30;

/// Trading days per year used to annualize daily volatility.
pub const DEFAULT_ANNUALIZATION: f64 = 252.0;

/// Rolling realized volatility estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealizedVolEstimator {
    /// Number of trailing log-returns used.
    pub window: usize,
    /// Periods per year.
    pub annualization: f64,
}

impl Default for RealizedVolEstimator {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            annualization: DEFAULT_ANNUALIZATION,
        }
    }
}

impl RealizedVolEstimator {
    pub fn new(window: usize, annualization: f64) -> Self {
        Self {
            window,
            annualization,
        }
    }

    /// Log-returns between consecutive prices.
    pub fn log_returns(prices: &[f64]) -> Vec<f64> {
        prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
    }

    /// Estimate over the whole slice, i.e. ending at its last price.
    pub fn estimate(&self, prices: &[f64]) -> Option<f64> {
        // The trailing `window` returns only need the last `window + 1` prices.
        let start = prices.len().saturating_sub(self.window + 1);
        let returns = Self::log_returns(&prices[start..]);

        if returns.len() < 2 {
            return None;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;

        Some(variance.sqrt() * self.annualization.sqrt())
    }

    /// Estimate using history up to and including `index`.
    pub fn estimate_at(&self, prices: &[f64], index: usize) -> Option<f64> {
        if index >= prices.len() {
            return None;
        }
        self.estimate(&prices[..=index])
    }
}
