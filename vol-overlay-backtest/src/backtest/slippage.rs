//! Slippage model for delayed fills.
//!
//! A delayed fill gives up a fixed fraction of the option premium to the
//! bid/ask spread: `premium * (1 - haircut)`. The default haircut is 0.1%.

use serde::{Deserialize, Serialize};

/// Default fraction of premium lost on a delayed fill.
pub const DEFAULT_PREMIUM_HAIRCUT: f64 = 0.001;

/// Configurable slippage model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageModel {
    /// Fraction of premium lost, in [0, 1).
    pub premium_haircut: f64,
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self {
            premium_haircut: DEFAULT_PREMIUM_HAIRCUT,
        }
    }
}

impl SlippageModel {
    /// Create a new slippage model with a custom haircut.
    pub fn new(premium_haircut: f64) -> Self {
        Self { premium_haircut }
    }

    /// Create a zero-slippage model.
    pub fn zero() -> Self {
        Self::new(0.0)
    }

    pub fn is_valid(&self) -> bool {
        (0.0..1.0).contains(&self.premium_haircut)
    }

    /// Premium after slippage.
    pub fn apply(&self, premium: f64) -> f64 {
        premium * (1.0 - self.premium_haircut)
    }
}
