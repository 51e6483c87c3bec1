pub mod loader;
pub mod types;

pub use loader::{parse_date, DataLoader, LoaderError};
pub use types::{OptionType, PriceBar, PriceSeries, SeriesError};
