//! Market data acquisition, normalization and tabular storage

pub mod frame;
pub mod loader;
pub mod normalize;
pub mod source;
pub mod types;

pub use frame::Frame;
pub use loader::DataLoader;
pub use normalize::normalize_rates;
pub use source::{CsvRateSource, MarketDataSource};
pub use types::{Bar, RawRate};
