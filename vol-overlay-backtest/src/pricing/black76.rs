//! Black-76 pricing for European options on a futures-style forward.
//!
//! No discounting is applied: premiums are quoted in forward terms, which
//! is what the overlay compares across instruments.
//!
//! d1 = (ln(F/K) + sigma^2 * t / 2) / (sigma * sqrt(t))
//! d2 = d1 - sigma * sqrt(t)
//! call = F * N(d1) - K * N(d2)
//! put  = K * N(-d2) - F * N(-d1)

use statrs::distribution::{ContinuousCDF, Normal};

use crate::data::OptionType;

/// Standard normal CDF.
fn norm_cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

/// Intrinsic value of an option on the forward.
pub fn intrinsic(forward: f64, strike: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => (forward - strike).max(0.0),
        OptionType::Put => (strike - forward).max(0.0),
    }
}

/// Calculate d1 and d2, or `None` when the option has no time value.
///
/// NaN inputs and a `vol * sqrt(time)` that underflows to zero also
/// return `None`.
fn d1_d2(forward: f64, strike: f64, time: f64, vol: f64) -> Option<(f64, f64)> {
    let vol_sqrt_t = vol * time.sqrt();
    if !(time > 0.0 && vol > 0.0 && vol_sqrt_t > 0.0) {
        return None;
    }
    let d1 = ((forward / strike).ln() + 0.5 * vol * vol * time) / vol_sqrt_t;
    Some((d1, d1 - vol_sqrt_t))
}

/// Premium of a European option on a forward.
///
/// Returns the intrinsic value when `time <= 0`, `vol <= 0`, or
/// `vol * sqrt(time)` is zero.
pub fn price(forward: f64, strike: f64, time: f64, vol: f64, option_type: OptionType) -> f64 {
    let Some((d1, d2)) = d1_d2(forward, strike, time, vol) else {
        return intrinsic(forward, strike, option_type);
    };

    match option_type {
        OptionType::Call => forward * norm_cdf(d1) - strike * norm_cdf(d2),
        OptionType::Put => strike * norm_cdf(-d2) - forward * norm_cdf(-d1),
    }
}

pub fn call_price(forward: f64, strike: f64, time: f64, vol: f64) -> f64 {
    price(forward, strike, time, vol, OptionType::Call)
}

pub fn put_price(forward: f64, strike: f64, time: f64, vol: f64) -> f64 {
    price(forward, strike, time, vol, OptionType::Put)
}

/// Call plus put at the same strike.
pub fn straddle(forward: f64, strike: f64, time: f64, vol: f64) -> f64 {
    call_price(forward, strike, time, vol) + put_price(forward, strike, time, vol)
}

/// Put struck at `put_strike` plus call struck at `call_strike`.
pub fn strangle(forward: f64, put_strike: f64, call_strike: f64, time: f64, vol: f64) -> f64 {
    put_price(forward, put_strike, time, vol) + call_price(forward, call_strike, time, vol)
}
