//! Backtest driver.
//!
//! Runs the signal simulator over every instrument:
//! 1. Load each instrument's close history
//! 2. Validate the configuration
//! 3. Simulate instruments in parallel, one seeded RNG per instrument
//! 4. Concatenate trades in input order (KC, SPX, EURUSD by default)

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::analytics::RealizedVolEstimator;
use crate::data::{DataLoader, LoaderError, PriceSeries};
use crate::risk::{ContractSpecs, SizingError};

use super::fill::{DelayBounds, FillSimulator};
use super::signal::{ImpliedVolDraw, Signal, SignalThresholds};
use super::simulator::{AssetRun, SignalSimulator};
use super::slippage::SlippageModel;
use super::trade::TradeRecord;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Failed to load {symbol}: {source}")]
    Load {
        symbol: String,
        #[source]
        source: LoaderError,
    },

    #[error("Failed to size {symbol}: {source}")]
    Sizing {
        symbol: String,
        #[source]
        source: SizingError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Configuration for a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Target notional per trade, in EUR.
    pub target_notional_eur: Decimal,

    /// Fixed EUR/USD rate used to convert the target notional.
    pub eur_usd: Decimal,

    /// Contract sizes by product symbol.
    pub contract_specs: ContractSpecs,

    /// Realized vol window in returns. Also the first evaluated bar.
    pub lookback_rv: usize,

    /// Periods per year for annualizing realized vol.
    pub annualization: f64,

    /// Buy convexity when iv < rv * iv_rv_long.
    pub iv_rv_long: f64,

    /// Sell premium when iv > rv * iv_rv_short.
    pub iv_rv_short: f64,

    /// Lower bound of the synthetic IV multiplier.
    pub iv_multiplier_low: f64,

    /// Upper bound of the synthetic IV multiplier.
    pub iv_multiplier_high: f64,

    /// Option tenor in trading days.
    pub option_tenor_days: u32,

    /// Trading days per year for the tenor.
    pub trading_days_per_year: f64,

    /// Bars left unevaluated at the end of every series.
    pub forward_reserve_bars: usize,

    /// Strangle strike offset as a fraction of spot.
    pub strangle_width_pct: f64,

    /// Simulate execution delay and slippage.
    pub delayed_fills: bool,

    pub delay_min_bars: usize,

    pub delay_max_bars: usize,

    /// Slippage applied to delayed fills.
    pub slippage: SlippageModel,

    /// Base RNG seed. Unset draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            target_notional_eur: Decimal::from(150_000),
            eur_usd: Decimal::new(107, 2),
            contract_specs: ContractSpecs::default(),
            lookback_rv: 30,
            annualization: 252.0,
            iv_rv_long: 0.85,
            iv_rv_short: 1.20,
            iv_multiplier_low: 0.8,
            iv_multiplier_high: 1.2,
            option_tenor_days: 30,
            trading_days_per_year: 252.0,
            forward_reserve_bars: 30,
            strangle_width_pct: 0.05,
            delayed_fills: true,
            delay_min_bars: 1,
            delay_max_bars: 8,
            slippage: SlippageModel::default(),
            seed: None,
        }
    }
}

impl BacktestConfig {
    /// Load a config from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, BacktestError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|source| BacktestError::ConfigRead {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, BacktestError> {
        Ok(toml::from_str(contents)?)
    }

    /// Target notional converted to USD.
    pub fn target_notional_usd(&self) -> Decimal {
        self.target_notional_eur * self.eur_usd
    }

    /// Target notional in USD as the sizer consumes it.
    pub fn target_notional_usd_f64(&self) -> f64 {
        f64::try_from(self.target_notional_usd()).unwrap_or(0.0)
    }

    /// Option tenor in years.
    pub fn tenor_years(&self) -> f64 {
        f64::from(self.option_tenor_days) / self.trading_days_per_year
    }

    pub fn vol_estimator(&self) -> RealizedVolEstimator {
        RealizedVolEstimator::new(self.lookback_rv, self.annualization)
    }

    pub fn iv_draw(&self) -> ImpliedVolDraw {
        ImpliedVolDraw::new(self.iv_multiplier_low, self.iv_multiplier_high)
    }

    pub fn thresholds(&self) -> SignalThresholds {
        SignalThresholds::new(self.iv_rv_long, self.iv_rv_short)
    }

    pub fn delay_bounds(&self) -> DelayBounds {
        DelayBounds::new(self.delay_min_bars, self.delay_max_bars)
    }

    pub fn fill_simulator(&self) -> FillSimulator {
        if self.delayed_fills {
            FillSimulator::delayed(self.delay_bounds(), self.slippage)
        } else {
            FillSimulator::immediate()
        }
    }

    /// Check the config for values the simulator cannot run with.
    pub fn validate(&self) -> Result<(), BacktestError> {
        let invalid = |msg: String| Err(BacktestError::InvalidConfig(msg));

        if self.target_notional_usd() <= Decimal::ZERO {
            return invalid(format!(
                "target notional must be positive, got {} EUR at {}",
                self.target_notional_eur, self.eur_usd
            ));
        }
        if self.lookback_rv < 2 {
            return invalid(format!(
                "lookback_rv must be at least 2, got {}",
                self.lookback_rv
            ));
        }
        if !(self.annualization > 0.0 && self.trading_days_per_year > 0.0) {
            return invalid("annualization and trading_days_per_year must be positive".into());
        }
        if !(self.iv_rv_long > 0.0 && self.iv_rv_long < self.iv_rv_short) {
            return invalid(format!(
                "thresholds must satisfy 0 < iv_rv_long < iv_rv_short, got {} and {}",
                self.iv_rv_long, self.iv_rv_short
            ));
        }
        if !(self.iv_multiplier_low > 0.0 && self.iv_multiplier_low <= self.iv_multiplier_high) {
            return invalid(format!(
                "IV multiplier bounds must satisfy 0 < low <= high, got {} and {}",
                self.iv_multiplier_low, self.iv_multiplier_high
            ));
        }
        if !(0.0..1.0).contains(&self.strangle_width_pct) {
            return invalid(format!(
                "strangle_width_pct must be in [0, 1), got {}",
                self.strangle_width_pct
            ));
        }
        if self.delayed_fills && !self.delay_bounds().is_valid() {
            return invalid(format!(
                "delay bounds must satisfy 1 <= min <= max, got {}..={}",
                self.delay_min_bars, self.delay_max_bars
            ));
        }
        if !self.slippage.is_valid() {
            return invalid(format!(
                "slippage must be in [0, 1), got {}",
                self.slippage.premium_haircut
            ));
        }
        if let Some(symbol) = self
            .contract_specs
            .symbols()
            .find(|s| self.contract_specs.get(s).is_some_and(|spec| spec.contract_size == 0))
        {
            return invalid(format!("contract size for {} is zero", symbol));
        }

        Ok(())
    }
}

/// One instrument to backtest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSource {
    pub symbol: String,
    pub path: PathBuf,
}

impl InstrumentSource {
    pub fn new(symbol: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            symbol: symbol.into(),
            path: path.into(),
        }
    }

    /// The reference instrument set, in output order.
    pub fn defaults(
        kc: impl Into<PathBuf>,
        spx: impl Into<PathBuf>,
        eurusd: impl Into<PathBuf>,
    ) -> Vec<Self> {
        vec![
            Self::new("KC", kc),
            Self::new("SPX", spx),
            Self::new("EURUSD", eurusd),
        ]
    }
}

/// Per-instrument run statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSummary {
    pub product: String,
    pub bars: usize,
    pub bars_evaluated: usize,
    pub trades: usize,
    pub buy_convexity: usize,
    pub sell_premium: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl InstrumentSummary {
    fn from_run(run: &AssetRun, series: &PriceSeries) -> Self {
        Self {
            product: run.product.clone(),
            bars: run.bars,
            bars_evaluated: run.bars_evaluated,
            trades: run.trades.len(),
            buy_convexity: run.count(Signal::BuyConvexity),
            sell_premium: run.count(Signal::SellPremium),
            first_date: series.first_date(),
            last_date: series.last_date(),
        }
    }
}

/// Result of a completed backtest.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    /// Configuration used.
    pub config: BacktestConfig,

    /// One summary per instrument, in input order.
    pub instruments: Vec<InstrumentSummary>,

    /// All trades, grouped by instrument in input order.
    pub trades: Vec<TradeRecord>,
}

impl BacktestResult {
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// First `n` trades.
    pub fn preview(&self, n: usize) -> &[TradeRecord] {
        &self.trades[..n.min(self.trades.len())]
    }

    pub fn trades_for<'a>(&'a self, product: &'a str) -> impl Iterator<Item = &'a TradeRecord> {
        self.trades.iter().filter(move |t| t.product == product)
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Backtest Results\n\
             ----------------------------------------\n\
             Trades: {}\n\
             Delayed fills: {}\n",
            self.trades.len(),
            if self.config.delayed_fills { "on" } else { "off" },
        );

        for inst in &self.instruments {
            let range = match (inst.first_date, inst.last_date) {
                (Some(first), Some(last)) => format!("{} to {}", first, last),
                _ => "no data".to_string(),
            };
            out.push_str(&format!(
                "\n{:<7} {} ({} bars, {} evaluated)\n  \
                 Trades: {} (BUY_CONVEXITY: {}, SELL_PREMIUM: {})",
                inst.product,
                range,
                inst.bars,
                inst.bars_evaluated,
                inst.trades,
                inst.buy_convexity,
                inst.sell_premium,
            ));
        }

        out
    }
}

/// The backtest driver.
pub struct BacktestEngine {
    config: BacktestConfig,
    loader: DataLoader,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            loader: DataLoader::new(),
        }
    }

    /// Use a loader that resolves relative paths against a base directory.
    pub fn with_loader(mut self, loader: DataLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Load every instrument from disk and run the backtest.
    pub fn run(&self, sources: &[InstrumentSource]) -> Result<BacktestResult, BacktestError> {
        let mut data = Vec::with_capacity(sources.len());

        for source in sources {
            let series = self
                .loader
                .load_series(&source.path)
                .map_err(|e| BacktestError::Load {
                    symbol: source.symbol.clone(),
                    source: e,
                })?;
            info!(
                "Loaded {} bars for {} from {}",
                series.len(),
                source.symbol,
                source.path.display()
            );
            data.push((source.symbol.clone(), series));
        }

        self.run_with_data(&data)
    }

    /// Run the backtest on pre-loaded series.
    pub fn run_with_data(
        &self,
        data: &[(String, PriceSeries)],
    ) -> Result<BacktestResult, BacktestError> {
        self.config.validate()?;

        let simulator = SignalSimulator::new(&self.config);
        let seed = self.config.seed;

        info!(
            "Running {} instruments (seed: {}, delayed fills: {})",
            data.len(),
            seed.map_or_else(|| "entropy".to_string(), |s| s.to_string()),
            self.config.delayed_fills
        );

        let runs: Vec<AssetRun> = data
            .par_iter()
            .enumerate()
            .map(|(idx, (symbol, series))| {
                let mut rng = match seed {
                    Some(base) => StdRng::seed_from_u64(base.wrapping_add(idx as u64)),
                    None => StdRng::from_entropy(),
                };
                simulator
                    .simulate_asset(series, symbol, &mut rng)
                    .map_err(|e| BacktestError::Sizing {
                        symbol: symbol.clone(),
                        source: e,
                    })
            })
            .collect::<Result<_, _>>()?;

        let instruments: Vec<InstrumentSummary> = runs
            .iter()
            .zip(data)
            .map(|(run, (_, series))| InstrumentSummary::from_run(run, series))
            .collect();

        for inst in &instruments {
            debug!("{}: {} trades", inst.product, inst.trades);
        }

        let trades: Vec<TradeRecord> = runs.into_iter().flat_map(|run| run.trades).collect();

        info!("Backtest complete: {} trades", trades.len());

        Ok(BacktestResult {
            config: self.config.clone(),
            instruments,
            trades,
        })
    }
}
