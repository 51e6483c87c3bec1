//! Position sizing module.
//!
//! Turns a target USD notional into a whole number of futures option
//! contracts:
//! - notional per contract = spot * contract size
//! - contracts = round(target / notional per contract), half to even
//! - never fewer than one contract

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizingError {
    #[error("No contract spec registered for symbol '{0}'")]
    UnknownSymbol(String),

    #[error("Invalid sizing input for {symbol}: {reason}")]
    InvalidInput { symbol: String, reason: String },
}

/// Static contract terms for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Units of the underlying per contract.
    pub contract_size: u32,
}

/// Contract specs keyed by product symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractSpecs(BTreeMap<String, InstrumentSpec>);

impl Default for ContractSpecs {
    fn default() -> Self {
        Self::from_sizes(&[("KC", 37_500), ("SPX", 100), ("EURUSD", 125_000)])
    }
}

impl ContractSpecs {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_sizes(sizes: &[(&str, u32)]) -> Self {
        Self(
            sizes
                .iter()
                .map(|(symbol, size)| {
                    (
                        symbol.to_string(),
                        InstrumentSpec {
                            contract_size: *size,
                        },
                    )
                })
                .collect(),
        )
    }

    pub fn insert(&mut self, symbol: &str, spec: InstrumentSpec) {
        self.0.insert(symbol.to_string(), spec);
    }

    pub fn get(&self, symbol: &str) -> Option<&InstrumentSpec> {
        self.0.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.0.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|s| s.as_str())
    }
}

/// Result of a sizing calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingResult {
    /// Contracts to trade (always >= 1).
    pub contracts: i32,
    /// USD notional of one contract at the given spot.
    pub notional_per_contract: f64,
    /// Whether the minimum of one contract overrode the rounded size.
    pub floored: bool,
}

/// Notional-based position sizer.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    specs: ContractSpecs,
    target_notional_usd: f64,
}

impl PositionSizer {
    pub fn new(specs: ContractSpecs, target_notional_usd: f64) -> Self {
        Self {
            specs,
            target_notional_usd,
        }
    }

    pub fn spec(&self, symbol: &str) -> Option<&InstrumentSpec> {
        self.specs.get(symbol)
    }

    pub fn target_notional_usd(&self) -> f64 {
        self.target_notional_usd
    }

    /// Size a position in `symbol` at `spot`.
    pub fn size(&self, symbol: &str, spot: f64) -> Result<SizingResult, SizingError> {
        let spec = self
            .specs
            .get(symbol)
            .ok_or_else(|| SizingError::UnknownSymbol(symbol.to_string()))?;

        Self::size_with_spec(symbol, spec, spot, self.target_notional_usd)
    }

    /// Size against an explicit spec and target.
    pub fn size_with_spec(
        symbol: &str,
        spec: &InstrumentSpec,
        spot: f64,
        target_notional_usd: f64,
    ) -> Result<SizingResult, SizingError> {
        let invalid = |reason: String| SizingError::InvalidInput {
            symbol: symbol.to_string(),
            reason,
        };

        if !(spot.is_finite() && spot > 0.0) {
            return Err(invalid(format!("spot must be positive, got {}", spot)));
        }
        if !(target_notional_usd.is_finite() && target_notional_usd > 0.0) {
            return Err(invalid(format!(
                "target notional must be positive, got {}",
                target_notional_usd
            )));
        }
        if spec.contract_size == 0 {
            return Err(invalid("contract size is zero".to_string()));
        }

        let notional_per_contract = spot * f64::from(spec.contract_size);
        let rounded = (target_notional_usd / notional_per_contract).round_ties_even();

        // `as` saturates, so absurdly small spots cannot wrap around.
        let raw = rounded as i32;
        let contracts = raw.max(1);

        Ok(SizingResult {
            contracts,
            notional_per_contract,
            floored: contracts != raw,
        })
    }
}
