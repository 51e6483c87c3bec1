//! Per-instrument signal and fill simulation.
//!
//! For each bar from `lookback_rv` up to `len - forward_reserve_bars`:
//! 1. Estimate realized vol from history up to and including the bar
//! 2. Draw a synthetic implied vol
//! 3. Classify IV/RV into a signal
//! 4. Price the structure, size it, simulate the fill
//! 5. Record the trade
//!
//! The trailing reserve keeps enough bars after every signal for a 30-day
//! option tenor. The reserve and the tenor are separate settings.

use rand::Rng;
use tracing::{debug, trace};

use crate::analytics::RealizedVolEstimator;
use crate::data::PriceSeries;
use crate::risk::{PositionSizer, SizingError};

use super::engine::BacktestConfig;
use super::fill::FillSimulator;
use super::signal::{ImpliedVolDraw, Signal, SignalThresholds};
use super::trade::{OptionStructure, TradeRecord};

/// Outcome of simulating one instrument.
#[derive(Debug, Clone, Default)]
pub struct AssetRun {
    pub product: String,
    /// Bars in the input series.
    pub bars: usize,
    /// Bars inside the evaluation range.
    pub bars_evaluated: usize,
    /// Bars skipped for lack of a volatility estimate.
    pub skipped_no_vol: usize,
    /// Bars that classified as NO_SIGNAL.
    pub no_signal: usize,
    /// Emitted trades, in bar order.
    pub trades: Vec<TradeRecord>,
}

impl AssetRun {
    pub fn count(&self, signal: Signal) -> usize {
        self.trades.iter().filter(|t| t.signal == signal).count()
    }
}

/// Signal and fill simulator for a single instrument.
#[derive(Debug, Clone)]
pub struct SignalSimulator {
    estimator: RealizedVolEstimator,
    iv_draw: ImpliedVolDraw,
    thresholds: SignalThresholds,
    sizer: PositionSizer,
    fills: FillSimulator,
    start_index: usize,
    forward_reserve_bars: usize,
    tenor_years: f64,
    strangle_width_pct: f64,
}

impl SignalSimulator {
    pub fn new(config: &BacktestConfig) -> Self {
        Self {
            estimator: config.vol_estimator(),
            iv_draw: config.iv_draw(),
            thresholds: config.thresholds(),
            sizer: PositionSizer::new(
                config.contract_specs.clone(),
                config.target_notional_usd_f64(),
            ),
            fills: config.fill_simulator(),
            start_index: config.lookback_rv,
            forward_reserve_bars: config.forward_reserve_bars,
            tenor_years: config.tenor_years(),
            strangle_width_pct: config.strangle_width_pct,
        }
    }

    /// Bar indices that are evaluated for a series of `len` bars.
    pub fn evaluation_range(&self, len: usize) -> std::ops::Range<usize> {
        let end = len.saturating_sub(self.forward_reserve_bars);
        self.start_index.min(end)..end
    }

    /// Run the simulation over one instrument's history.
    ///
    /// Fails only if `product` has no contract spec. The check happens
    /// before the first bar so a misconfigured instrument never produces a
    /// partial trade list.
    pub fn simulate_asset<R: Rng + ?Sized>(
        &self,
        series: &PriceSeries,
        product: &str,
        rng: &mut R,
    ) -> Result<AssetRun, SizingError> {
        if self.sizer.spec(product).is_none() {
            return Err(SizingError::UnknownSymbol(product.to_string()));
        }

        let closes = series.closes();
        let range = self.evaluation_range(closes.len());

        let mut run = AssetRun {
            product: product.to_string(),
            bars: closes.len(),
            bars_evaluated: range.len(),
            ..Default::default()
        };

        for idx in range {
            let Some(rv) = self.estimator.estimate_at(&closes, idx) else {
                run.skipped_no_vol += 1;
                continue;
            };

            let iv = self.iv_draw.draw(rv, rng);
            let signal = self.thresholds.classify(iv, rv);

            let spot = closes[idx];
            let Some(structure) = OptionStructure::for_signal(signal, spot, self.strangle_width_pct)
            else {
                run.no_signal += 1;
                continue;
            };

            let premium = structure.premium(spot, self.tenor_years, iv);
            let sizing = self.sizer.size(product, spot)?;
            let fill = self.fills.fill(&closes, idx, premium, rng);

            // `idx` is inside the evaluation range, so the bar exists.
            let date = series.bars()[idx].date;

            trace!(
                "{} {} {}: rv={:.4} iv={:.4} legs={:?} premium={:.6} contracts={} fill_idx={}",
                product,
                date,
                signal,
                rv,
                iv,
                structure.legs(),
                fill.premium,
                sizing.contracts,
                fill.index
            );

            run.trades.push(TradeRecord {
                date,
                product: product.to_string(),
                signal,
                spot_entry: spot,
                spot_fill: fill.spot,
                iv,
                rv,
                premium: fill.premium,
                contracts: sizing.contracts,
            });
        }

        debug!(
            "{}: {} bars, {} evaluated, {} trades ({} buy, {} sell), {} neutral, {} without vol",
            product,
            run.bars,
            run.bars_evaluated,
            run.trades.len(),
            run.count(Signal::BuyConvexity),
            run.count(Signal::SellPremium),
            run.no_signal,
            run.skipped_no_vol
        );

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::pricing::black76;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    fn random_walk(n: usize, seed: u64) -> PriceSeries {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut closes = Vec::with_capacity(n);
        let mut price = 100.0_f64;
        for _ in 0..n {
            let shock: f64 = rng.gen_range(-0.02..0.02);
            price *= shock.exp();
            closes.push(price);
        }
        PriceSeries::from_closes(start(), &closes).unwrap()
    }

    fn config(delayed: bool) -> BacktestConfig {
        BacktestConfig {
            delayed_fills: delayed,
            ..Default::default()
        }
    }

    #[test]
    fn test_evaluation_range() {
        let sim = SignalSimulator::new(&BacktestConfig::default());
        assert_eq!(sim.evaluation_range(100), 30..70);
        assert_eq!(sim.evaluation_range(60), 30..30);
        assert!(sim.evaluation_range(45).is_empty());
        assert!(sim.evaluation_range(0).is_empty());
    }

    #[test]
    fn test_short_series_yields_nothing() {
        let sim = SignalSimulator::new(&config(true));
        let mut rng = StdRng::seed_from_u64(1);
        let run = sim.simulate_asset(&random_walk(59, 3), "KC", &mut rng).unwrap();
        assert!(run.trades.is_empty());
        assert_eq!(run.bars_evaluated, 0);
    }

    #[test]
    fn test_flat_series_yields_zero_trades() {
        let series = PriceSeries::from_closes(start(), &[100.0; 100]).unwrap();
        let sim = SignalSimulator::new(&config(true));
        let mut rng = StdRng::seed_from_u64(9);

        let run = sim.simulate_asset(&series, "SPX", &mut rng).unwrap();
        assert!(run.trades.is_empty());
        assert_eq!(run.bars_evaluated, 40);
        // rv = 0 is a defined estimate, so every bar is neutral rather than skipped.
        assert_eq!(run.skipped_no_vol, 0);
        assert_eq!(run.no_signal, 40);
    }

    #[test]
    fn test_forced_low_iv_buys_convexity_every_bar() {
        // Monotonically increasing closes with a small, non-zero rv.
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 + i as f64 * 0.1 + if i % 2 == 0 { 0.0 } else { 0.03 })
            .collect();
        let series = PriceSeries::from_closes(start(), &closes).unwrap();

        let cfg = BacktestConfig {
            delayed_fills: false,
            iv_multiplier_low: 0.5,
            iv_multiplier_high: 0.5,
            ..Default::default()
        };
        let sim = SignalSimulator::new(&cfg);
        let mut rng = StdRng::seed_from_u64(0);
        let run = sim.simulate_asset(&series, "SPX", &mut rng).unwrap();

        assert_eq!(run.trades.len(), 120 - 30 - 30);
        let t = 30.0 / 252.0;
        for trade in &run.trades {
            assert_eq!(trade.signal, Signal::BuyConvexity);
            assert!(trade.rv > 0.0);
            assert_eq!(trade.iv, trade.rv * 0.5);
            let expected = black76::price(
                trade.spot_entry,
                trade.spot_entry,
                t,
                trade.iv,
                crate::data::OptionType::Call,
            ) + black76::price(
                trade.spot_entry,
                trade.spot_entry,
                t,
                trade.iv,
                crate::data::OptionType::Put,
            );
            assert_eq!(trade.premium, expected);
            assert_eq!(trade.spot_fill, trade.spot_entry);
        }

        // Records are in bar order.
        assert!(run.trades.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_forced_high_iv_sells_premium() {
        let series = random_walk(150, 21);
        let cfg = BacktestConfig {
            delayed_fills: false,
            iv_multiplier_low: 1.5,
            iv_multiplier_high: 1.5,
            ..Default::default()
        };
        let sim = SignalSimulator::new(&cfg);
        let mut rng = StdRng::seed_from_u64(0);
        let run = sim.simulate_asset(&series, "KC", &mut rng).unwrap();

        assert_eq!(run.trades.len(), 90);
        let t = 30.0 / 252.0;
        for trade in &run.trades {
            assert_eq!(trade.signal, Signal::SellPremium);
            let s = trade.spot_entry;
            let expected = black76::strangle(s, s - 0.05 * s, s + 0.05 * s, t, trade.iv);
            assert!((trade.premium - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_no_delay_fill_equals_entry() {
        let series = random_walk(300, 5);
        let sim = SignalSimulator::new(&config(false));
        let mut rng = StdRng::seed_from_u64(17);
        let run = sim.simulate_asset(&series, "EURUSD", &mut rng).unwrap();

        assert!(!run.trades.is_empty());
        for trade in &run.trades {
            assert_eq!(trade.spot_fill, trade.spot_entry);
        }
    }

    #[test]
    fn test_delayed_fill_uses_a_later_close() {
        let series = random_walk(300, 8);
        let closes = series.closes();
        let sim = SignalSimulator::new(&config(true));
        let mut rng = StdRng::seed_from_u64(23);
        let run = sim.simulate_asset(&series, "EURUSD", &mut rng).unwrap();

        assert!(!run.trades.is_empty());
        for trade in &run.trades {
            let entry_idx = series
                .bars()
                .iter()
                .position(|b| b.date == trade.date)
                .unwrap();
            let last = closes.len() - 1;
            let window = &closes[(entry_idx + 1).min(last)..=(entry_idx + 8).min(last)];
            assert!(
                window.contains(&trade.spot_fill),
                "fill {} not within 1-8 bars of {}",
                trade.spot_fill,
                trade.date
            );
        }
    }

    #[test]
    fn test_delay_applies_slippage() {
        let series = random_walk(200, 2);
        let seed = 99;

        let cfg = BacktestConfig {
            iv_multiplier_low: 0.5,
            iv_multiplier_high: 0.5,
            ..Default::default()
        };
        let sim = SignalSimulator::new(&cfg);
        let delayed = sim
            .simulate_asset(&series, "SPX", &mut StdRng::seed_from_u64(seed))
            .unwrap();

        let immediate_cfg = BacktestConfig {
            delayed_fills: false,
            ..cfg
        };
        let immediate = SignalSimulator::new(&immediate_cfg)
            .simulate_asset(&series, "SPX", &mut StdRng::seed_from_u64(seed))
            .unwrap();

        assert_eq!(delayed.trades.len(), immediate.trades.len());
        for (d, i) in delayed.trades.iter().zip(&immediate.trades) {
            assert!((d.premium - i.premium * 0.999).abs() < 1e-9);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let series = random_walk(250, 4);
        let sim = SignalSimulator::new(&config(true));
        let a = sim
            .simulate_asset(&series, "KC", &mut StdRng::seed_from_u64(77))
            .unwrap();
        let b = sim
            .simulate_asset(&series, "KC", &mut StdRng::seed_from_u64(77))
            .unwrap();
        assert_eq!(a.trades, b.trades);
    }

    #[test]
    fn test_contracts_at_least_one() {
        let series = random_walk(200, 12);
        let sim = SignalSimulator::new(&config(true));
        let run = sim
            .simulate_asset(&series, "SPX", &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert!(run.trades.iter().all(|t| t.contracts >= 1));
    }

    #[test]
    fn test_unknown_product_fails_before_simulating() {
        let series = random_walk(200, 1);
        let sim = SignalSimulator::new(&BacktestConfig::default());
        let err = sim
            .simulate_asset(&series, "CL", &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert_eq!(err, SizingError::UnknownSymbol("CL".to_string()));
    }
}
