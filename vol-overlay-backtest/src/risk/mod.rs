//! Risk module.
//!
//! Provides notional-based position sizing per instrument.

pub mod position_sizer;

pub use position_sizer::{ContractSpecs, InstrumentSpec, PositionSizer, SizingError, SizingResult};
