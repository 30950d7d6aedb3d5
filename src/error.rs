//! Error taxonomy shared by every transformer: configuration, data quality, I/O.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, Error)]
pub enum FeatureError {
    // Configuration
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),
    #[error("unknown aggregation method '{0}'")]
    UnknownMethod(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no features selected; select at least one feature")]
    NoFeaturesSelected,
    #[error("column '{column}' is categorical; set a categorical aggregation policy")]
    CategoricalColumn { column: String },
    #[error("{0} must be fitted before transform")]
    NotFitted(&'static str),

    // Data quality
    #[error("required column '{column}' not found")]
    MissingColumn { column: String },
    #[error("missing value in column '{column}' at row {row}")]
    MissingValue { column: String, row: usize },
    #[error("invalid timestamp '{value}' at row {row}")]
    InvalidTimestamp { row: usize, value: String },
    #[error("timestamps of case '{case_id}' are not in increasing order")]
    NonMonotonicTimestamps { case_id: String },
    #[error("shape mismatch: expected {expected} rows, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    // I/O
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeatureError {
    /// True for errors caused by configuration rather than data.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            FeatureError::UnknownFeature(_)
                | FeatureError::UnknownMethod(_)
                | FeatureError::InvalidConfig(_)
                | FeatureError::NoFeaturesSelected
                | FeatureError::CategoricalColumn { .. }
                | FeatureError::NotFitted(_)
        )
    }
}
