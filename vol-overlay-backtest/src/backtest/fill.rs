//! Fill simulation with optional execution delay.
//!
//! With delayed fills the order executes `U{min..=max}` bars after the
//! signal (roughly one bar per 15 minutes of latency, 1-8 bars by default),
//! capped at the last bar of the series. The fill spot is the close at that
//! bar and the premium loses the slippage haircut. Without delay the fill is
//! the entry bar itself and the premium is untouched.

use rand::Rng;

use super::slippage::SlippageModel;

/// Inclusive bounds on the simulated delay, in bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayBounds {
    pub min_bars: usize,
    pub max_bars: usize,
}

impl Default for DelayBounds {
    fn default() -> Self {
        Self {
            min_bars: 1,
            max_bars: 8,
        }
    }
}

impl DelayBounds {
    pub fn new(min_bars: usize, max_bars: usize) -> Self {
        Self { min_bars, max_bars }
    }

    pub fn is_valid(&self) -> bool {
        self.min_bars >= 1 && self.min_bars <= self.max_bars
    }

    /// Draw a delay from `[min_bars, max_bars]`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(self.min_bars..=self.max_bars)
    }
}

/// Simulated execution of one signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    /// Bar index the order executed on.
    pub index: usize,
    /// Close at the fill bar.
    pub spot: f64,
    /// Premium after slippage.
    pub premium: f64,
}

/// Fill simulator.
#[derive(Debug, Clone, Copy)]
pub struct FillSimulator {
    delay: Option<DelayBounds>,
    slippage: SlippageModel,
}

impl FillSimulator {
    /// Fills at the signal bar, no slippage.
    pub fn immediate() -> Self {
        Self {
            delay: None,
            slippage: SlippageModel::zero(),
        }
    }

    /// Fills after a random delay, with slippage on the premium.
    pub fn delayed(bounds: DelayBounds, slippage: SlippageModel) -> Self {
        Self {
            delay: Some(bounds),
            slippage,
        }
    }

    pub fn is_delayed(&self) -> bool {
        self.delay.is_some()
    }

    /// Simulate the fill of a signal raised at `entry_idx`.
    ///
    /// `closes` must be non-empty and `entry_idx` in range.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        closes: &[f64],
        entry_idx: usize,
        premium: f64,
        rng: &mut R,
    ) -> Fill {
        match self.delay {
            Some(bounds) => {
                let last_idx = closes.len().saturating_sub(1);
                let index = (entry_idx + bounds.draw(rng)).min(last_idx);
                Fill {
                    index,
                    spot: closes[index],
                    premium: self.slippage.apply(premium),
                }
            }
            None => Fill {
                index: entry_idx,
                spot: closes[entry_idx],
                premium,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn closes(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_immediate_fill() {
        let prices = closes(20);
        let mut rng = StdRng::seed_from_u64(3);
        let fill = FillSimulator::immediate().fill(&prices, 5, 12.0, &mut rng);
        assert_eq!(fill.index, 5);
        assert_eq!(fill.spot, 105.0);
        assert_eq!(fill.premium, 12.0);
    }

    #[test]
    fn test_delayed_fill_within_bounds() {
        let prices = closes(100);
        let sim = FillSimulator::delayed(DelayBounds::default(), SlippageModel::default());
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [false; 9];

        for _ in 0..2_000 {
            let fill = sim.fill(&prices, 10, 10.0, &mut rng);
            assert!((11..=18).contains(&fill.index));
            assert_eq!(fill.spot, prices[fill.index]);
            assert!((fill.premium - 9.99).abs() < 1e-12);
            seen[fill.index - 10] = true;
        }

        // Both ends of the range are reachable.
        assert!(seen[1..=8].iter().all(|&s| s));
    }

    #[test]
    fn test_delayed_fill_capped_at_series_end() {
        let prices = closes(12);
        let sim = FillSimulator::delayed(DelayBounds::default(), SlippageModel::default());
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..500 {
            let fill = sim.fill(&prices, 9, 1.0, &mut rng);
            assert!((10..=11).contains(&fill.index));
        }

        let fill = sim.fill(&prices, 11, 1.0, &mut rng);
        assert_eq!(fill.index, 11);
        assert_eq!(fill.spot, 111.0);
    }

    #[test]
    fn test_delay_bounds_validity() {
        assert!(DelayBounds::default().is_valid());
        assert!(DelayBounds::new(3, 3).is_valid());
        assert!(!DelayBounds::new(0, 8).is_valid());
        assert!(!DelayBounds::new(5, 4).is_valid());
    }
}
