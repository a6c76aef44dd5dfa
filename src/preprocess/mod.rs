//! Leakage-safe preprocessing stages fitted on training windows only

pub mod reduce;
pub mod stationarity;

pub use reduce::{Reducer, ReducerState};
pub use stationarity::{adf_test, AdfResult, FittedStationarity, StationarityFilter};
