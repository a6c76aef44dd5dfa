//! Error types shared across the pipeline

use thiserror::Error;

/// Errors that can occur in the feature/label/model pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no input rows")]
    EmptyInput,

    #[error("data source returned no usable rows: {0}")]
    DataUnavailable(String),

    #[error("only {actual} rows available, {required} required to build features reliably")]
    InsufficientData { actual: usize, required: usize },

    #[error("{0} must be fitted before transform")]
    NotFitted(&'static str),

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("label alignment failed: {0}")]
    Misaligned(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
