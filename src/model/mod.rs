//! Classifier, evaluation and search

pub mod evaluate;
pub mod gbm;
pub mod metrics;
pub mod persist;
pub mod search;

pub use evaluate::{time_series_split, CvOutcome, FoldPipeline, FoldSplit, WalkForwardEvaluator};
pub use gbm::{GbmClassifier, GbmParams};
pub use metrics::average_precision;
pub use persist::TrainedArtifacts;
pub use search::{
    JsonlRecorder, MemoryRecorder, ParamSpace, RunRecord, RunRecorder, SearchOutcome, SearchRunner,
};
