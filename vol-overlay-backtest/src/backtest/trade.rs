//! Option structures and trade records.
//!
//! A signal maps to one two-legged structure priced on the instrument's
//! spot as the forward:
//! - `BUY_CONVEXITY`: long ATM straddle (call + put at spot)
//! - `SELL_PREMIUM`: short strangle (call at spot + w, put at spot - w)
//!
//! Each signaling bar produces exactly one `TradeRecord`. Records are
//! write-once; the column order below is the output schema.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::OptionType;
use crate::pricing::black76;

use super::signal::Signal;

/// Column names of the trade table, in output order.
pub const TRADE_COLUMNS: &[&str] = &[
    "date",
    "product",
    "signal",
    "spot_entry",
    "spot_fill",
    "iv",
    "rv",
    "premium",
    "contracts",
];

/// A single option leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub option_type: OptionType,
    pub strike: f64,
}

/// Option structure traded for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OptionStructure {
    /// Call and put at the same strike.
    Straddle { strike: f64 },
    /// Out-of-the-money put and call.
    Strangle { put_strike: f64, call_strike: f64 },
}

impl OptionStructure {
    /// Structure for `signal` at `spot`. `width_pct` sets the strangle
    /// offset as a fraction of spot.
    pub fn for_signal(signal: Signal, spot: f64, width_pct: f64) -> Option<Self> {
        match signal {
            Signal::BuyConvexity => Some(Self::Straddle { strike: spot }),
            Signal::SellPremium => {
                let width = width_pct * spot;
                Some(Self::Strangle {
                    put_strike: spot - width,
                    call_strike: spot + width,
                })
            }
            Signal::NoSignal => None,
        }
    }

    pub fn legs(&self) -> [OptionLeg; 2] {
        match *self {
            Self::Straddle { strike } => [
                OptionLeg {
                    option_type: OptionType::Call,
                    strike,
                },
                OptionLeg {
                    option_type: OptionType::Put,
                    strike,
                },
            ],
            Self::Strangle {
                put_strike,
                call_strike,
            } => [
                OptionLeg {
                    option_type: OptionType::Call,
                    strike: call_strike,
                },
                OptionLeg {
                    option_type: OptionType::Put,
                    strike: put_strike,
                },
            ],
        }
    }

    /// Combined premium of both legs per unit of underlying.
    pub fn premium(&self, forward: f64, time: f64, vol: f64) -> f64 {
        match *self {
            Self::Straddle { strike } => black76::straddle(forward, strike, time, vol),
            Self::Strangle {
                put_strike,
                call_strike,
            } => black76::strangle(forward, put_strike, call_strike, time, vol),
        }
    }
}

/// One simulated trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Signal bar date.
    pub date: NaiveDate,
    /// Product symbol (e.g., "KC").
    pub product: String,
    /// BUY_CONVEXITY or SELL_PREMIUM.
    pub signal: Signal,
    /// Close on the signal bar.
    pub spot_entry: f64,
    /// Close on the fill bar.
    pub spot_fill: f64,
    /// Synthetic implied vol used for pricing.
    pub iv: f64,
    /// Realized vol at the signal bar.
    pub rv: f64,
    /// Structure premium per unit, after slippage.
    pub premium: f64,
    /// Contract count.
    pub contracts: i32,
}

impl TradeRecord {
    /// Premium times contracts, the downstream per-trade P&L measure.
    pub fn pnl(&self) -> f64 {
        self.premium * f64::from(self.contracts)
    }

    /// Implied over realized vol.
    pub fn iv_rv_ratio(&self) -> Option<f64> {
        if self.rv > 0.0 {
            Some(self.iv / self.rv)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENOR: f64 = 30.0 / 252.0;

    #[test]
    fn test_structure_for_signal() {
        assert_eq!(
            OptionStructure::for_signal(Signal::BuyConvexity, 100.0, 0.05),
            Some(OptionStructure::Straddle { strike: 100.0 })
        );
        assert_eq!(
            OptionStructure::for_signal(Signal::SellPremium, 100.0, 0.05),
            Some(OptionStructure::Strangle {
                put_strike: 95.0,
                call_strike: 105.0
            })
        );
        assert_eq!(OptionStructure::for_signal(Signal::NoSignal, 100.0, 0.05), None);
    }

    #[test]
    fn test_legs() {
        let legs = OptionStructure::Strangle {
            put_strike: 95.0,
            call_strike: 105.0,
        }
        .legs();
        assert_eq!(legs[0].option_type, OptionType::Call);
        assert_eq!(legs[0].strike, 105.0);
        assert_eq!(legs[1].option_type, OptionType::Put);
        assert_eq!(legs[1].strike, 95.0);
    }

    #[test]
    fn test_structure_premium_matches_pricer() {
        let straddle = OptionStructure::Straddle { strike: 100.0 };
        let expected = black76::call_price(100.0, 100.0, TENOR, 0.2)
            + black76::put_price(100.0, 100.0, TENOR, 0.2);
        assert_eq!(straddle.premium(100.0, TENOR, 0.2), expected);

        let strangle = OptionStructure::for_signal(Signal::SellPremium, 100.0, 0.05).unwrap();
        let expected = black76::call_price(100.0, 105.0, TENOR, 0.2)
            + black76::put_price(100.0, 95.0, TENOR, 0.2);
        assert!((strangle.premium(100.0, TENOR, 0.2) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_record_pnl_and_ratio() {
        let record = TradeRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            product: "SPX".to_string(),
            signal: Signal::SellPremium,
            spot_entry: 5000.0,
            spot_fill: 5010.0,
            iv: 0.18,
            rv: 0.12,
            premium: 45.5,
            contracts: 3,
        };
        assert_eq!(record.pnl(), 136.5);
        assert!((record.iv_rv_ratio().unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_trade_columns() {
        assert_eq!(TRADE_COLUMNS.len(), 9);
        assert_eq!(TRADE_COLUMNS[0], "date");
        assert_eq!(TRADE_COLUMNS[8], "contracts");
    }
}
