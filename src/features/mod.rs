//! Feature computation and labeling

pub mod engineering;
pub mod labeling;
pub mod technical;

pub use engineering::{add_all_features, feature_columns, FEATURE_COLUMNS, MIN_FEATURE_ROWS};
pub use labeling::{make_label, split_xy, TargetSeries, TARGET_COLUMN};
