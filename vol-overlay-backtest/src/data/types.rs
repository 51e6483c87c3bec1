//! Core data types for the volatility overlay backtest.
//!
//! Price history comes in as daily closes per instrument. A `PriceSeries`
//! is always sorted by date and only ever holds finite, positive closes, so
//! everything downstream (volatility, pricing, sizing) can take it at face
//! value.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

/// Daily close for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
}

impl PriceBar {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Non-positive or non-finite close {close} on {date}")]
    InvalidClose { date: NaiveDate, close: f64 },

    #[error("Duplicate bar for {0}")]
    DuplicateDate(NaiveDate),
}

/// Date-ordered close history for a single instrument.
///
/// Immutable once built: the simulator and the estimators only borrow it.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from bars in any order.
    ///
    /// Bars are re-sorted by date. Any bar with a non-finite or
    /// non-positive close, or two bars on the same date, rejects the
    /// whole series.
    pub fn new(mut bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        if let Some(bad) = bars.iter().find(|b| !(b.close.is_finite() && b.close > 0.0)) {
            return Err(SeriesError::InvalidClose {
                date: bad.date,
                close: bad.close,
            });
        }

        bars.sort_by_key(|b| b.date);

        if let Some(pair) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate(pair[1].date));
        }

        Ok(Self { bars })
    }

    /// Convenience constructor for consecutive calendar days starting at `start`.
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Result<Self, SeriesError> {
        let bars = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&close, date)| PriceBar::new(date, close))
            .collect();
        Self::new(bars)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn get(&self, idx: usize) -> Option<&PriceBar> {
        self.bars.get(idx)
    }

    /// Closing prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_series_sorted_by_date() {
        let series = PriceSeries::new(vec![
            PriceBar::new(d(2024, 1, 3), 102.0),
            PriceBar::new(d(2024, 1, 1), 100.0),
            PriceBar::new(d(2024, 1, 2), 101.0),
        ])
        .unwrap();

        assert_eq!(series.closes(), vec![100.0, 101.0, 102.0]);
        assert_eq!(series.first_date(), Some(d(2024, 1, 1)));
        assert_eq!(series.last_date(), Some(d(2024, 1, 3)));
    }

    #[test]
    fn test_series_rejects_bad_close() {
        let err = PriceSeries::new(vec![
            PriceBar::new(d(2024, 1, 1), 100.0),
            PriceBar::new(d(2024, 1, 2), 0.0),
        ])
        .unwrap_err();
        assert!(matches!(err, SeriesError::InvalidClose { .. }));

        let err = PriceSeries::new(vec![PriceBar::new(d(2024, 1, 1), f64::NAN)]).unwrap_err();
        assert!(matches!(err, SeriesError::InvalidClose { .. }));
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let err = PriceSeries::new(vec![
            PriceBar::new(d(2024, 1, 2), 100.0),
            PriceBar::new(d(2024, 1, 2), 101.0),
        ])
        .unwrap_err();
        assert_eq!(err, SeriesError::DuplicateDate(d(2024, 1, 2)));
    }

    #[test]
    fn test_from_closes() {
        let series = PriceSeries::from_closes(d(2024, 2, 28), &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.get(2).unwrap().date, d(2024, 3, 1));
    }
}
