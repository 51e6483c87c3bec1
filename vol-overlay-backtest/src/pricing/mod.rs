//! Option pricing.

pub mod black76;
