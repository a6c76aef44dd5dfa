//! Direction prediction for currency bars with gradient-boosted trees.
//!
//! The pipeline turns raw rate records into a trained classifier of the
//! next bar's close direction:
//!
//! 1. normalize raw records into clean, time-ordered bars;
//! 2. compute a fixed table of technical features and discrete signals;
//! 3. label each row with the direction of the close one horizon ahead;
//! 4. difference non-stationary columns, frozen per training window;
//! 5. standardize and project onto principal components;
//! 6. score hyperparameter candidates by walk-forward average precision
//!    and fit the winner on the full history.
//!
//! Every stage that learns anything is fitted strictly on training rows
//! and replayed on later rows, and all sampled randomness is seeded.

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod model;
pub mod preprocess;

pub use config::{Settings, Timeframe};
pub use data::{normalize_rates, Bar, DataLoader, Frame, RawRate};
pub use error::{PipelineError, Result};
pub use features::{add_all_features, make_label, split_xy, TargetSeries, FEATURE_COLUMNS};
pub use model::{
    average_precision, GbmClassifier, GbmParams, SearchRunner, TrainedArtifacts,
    WalkForwardEvaluator,
};
pub use preprocess::{Reducer, StationarityFilter};
