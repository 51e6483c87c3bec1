//! Volatility signal: synthetic implied vol and the IV/RV classification.
//!
//! | Condition            | Signal          | Structure            |
//! |----------------------|-----------------|----------------------|
//! | iv < rv * 0.85       | BUY_CONVEXITY   | ATM straddle         |
//! | iv > rv * 1.20       | SELL_PREMIUM    | +/-5% strangle       |
//! | otherwise            | NO_SIGNAL       | none                 |
//!
//! Implied vol is not observed. It is drawn as `rv * U(0.8, 1.2)`, a
//! placeholder generator rather than a calibrated input.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Outcome of classifying one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    /// Implied vol cheap relative to realized: buy a straddle.
    BuyConvexity,
    /// Implied vol rich relative to realized: sell a strangle.
    SellPremium,
    /// Ratio inside the neutral band.
    NoSignal,
}

impl Signal {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY_CONVEXITY" => Some(Self::BuyConvexity),
            "SELL_PREMIUM" => Some(Self::SellPremium),
            "NO_SIGNAL" => Some(Self::NoSignal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuyConvexity => "BUY_CONVEXITY",
            Self::SellPremium => "SELL_PREMIUM",
            Self::NoSignal => "NO_SIGNAL",
        }
    }

    /// Whether this signal produces a trade.
    pub fn is_trade(&self) -> bool {
        !matches!(self, Self::NoSignal)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IV/RV ratio thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    /// Buy convexity below `rv * long_ratio`.
    pub long_ratio: f64,
    /// Sell premium above `rv * short_ratio`.
    pub short_ratio: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            long_ratio: 0.85,
            short_ratio: 1.20,
        }
    }
}

impl SignalThresholds {
    pub fn new(long_ratio: f64, short_ratio: f64) -> Self {
        Self {
            long_ratio,
            short_ratio,
        }
    }

    /// Classify implied against realized vol.
    pub fn classify(&self, iv: f64, rv: f64) -> Signal {
        if iv < rv * self.long_ratio {
            Signal::BuyConvexity
        } else if iv > rv * self.short_ratio {
            Signal::SellPremium
        } else {
            Signal::NoSignal
        }
    }
}

/// Synthetic implied vol: realized vol times a uniform multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpliedVolDraw {
    pub low: f64,
    pub high: f64,
}

impl Default for ImpliedVolDraw {
    fn default() -> Self {
        Self {
            low: 0.8,
            high: 1.2,
        }
    }
}

impl ImpliedVolDraw {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Fixed multiplier, for deterministic runs.
    pub fn fixed(multiplier: f64) -> Self {
        Self::new(multiplier, multiplier)
    }

    /// Draw the multiplier from `[low, high)`, or `low` when the bounds meet.
    pub fn multiplier<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.high > self.low {
            rng.gen_range(self.low..self.high)
        } else {
            self.low
        }
    }

    pub fn draw<R: Rng + ?Sized>(&self, rv: f64, rng: &mut R) -> f64 {
        rv * self.multiplier(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_signal_strings() {
        for signal in [Signal::BuyConvexity, Signal::SellPremium, Signal::NoSignal] {
            assert_eq!(Signal::from_str(signal.as_str()), Some(signal));
        }
        assert_eq!(Signal::from_str("buy_convexity"), Some(Signal::BuyConvexity));
        assert_eq!(Signal::from_str("HOLD"), None);
        assert_eq!(Signal::SellPremium.to_string(), "SELL_PREMIUM");
    }

    #[test]
    fn test_classification_bands() {
        let t = SignalThresholds::default();
        let rv = 0.20;
        assert_eq!(t.classify(0.16, rv), Signal::BuyConvexity);
        assert_eq!(t.classify(0.17, rv), Signal::NoSignal); // exactly 0.85 * rv is neutral
        assert_eq!(t.classify(0.20, rv), Signal::NoSignal);
        assert_eq!(t.classify(0.24, rv), Signal::NoSignal);
        assert_eq!(t.classify(0.2401, rv), Signal::SellPremium);
    }

    #[test]
    fn test_zero_rv_never_signals() {
        let t = SignalThresholds::default();
        let mut rng = StdRng::seed_from_u64(7);
        let draw = ImpliedVolDraw::default();
        for _ in 0..1000 {
            let iv = draw.draw(0.0, &mut rng);
            assert_eq!(t.classify(iv, 0.0), Signal::NoSignal);
        }
    }

    #[test]
    fn test_draw_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let draw = ImpliedVolDraw::default();
        for _ in 0..10_000 {
            let m = draw.multiplier(&mut rng);
            assert!((0.8..1.2).contains(&m));
        }
    }

    #[test]
    fn test_fixed_draw() {
        let mut rng = StdRng::seed_from_u64(1);
        let draw = ImpliedVolDraw::fixed(0.5);
        assert_eq!(draw.draw(0.3, &mut rng), 0.15);
    }

    #[test]
    fn test_signal_serde_names() {
        let json = serde_json::to_string(&Signal::BuyConvexity).unwrap();
        assert_eq!(json, "\"BUY_CONVEXITY\"");
        let parsed: Signal = serde_json::from_str("\"SELL_PREMIUM\"").unwrap();
        assert_eq!(parsed, Signal::SellPremium);
    }
}
