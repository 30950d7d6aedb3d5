//! Feature extraction transformers over event logs.
//!
//! Each transformer is built from a typed config, fitted once, and then transforms
//! without mutation, so a fitted instance can be shared across threads.

mod aggregation;
mod bucketing;
mod frame;
mod matrix;
mod pipeline;
mod resource;
pub mod targets;
mod timestamp;
mod variant;
mod vocab;

pub use aggregation::{broadcast, AggregationMethod, CategoricalPolicy, NanPolicy, TraceAggregator};
pub use bucketing::Bucketing;
pub use frame::{CaseFrame, Column};
pub use matrix::FeatureMatrix;
pub use pipeline::{CaseFeaturePipeline, RESOURCE_POOL_COLUMN};
pub use resource::{DriftReport, PoolAssignment, PoolClustering, PoolLabel, ResourcePoolExtractor};
pub use timestamp::{CaseOrdering, FeatureSelection, TimeFeature, TimeUnit, TimestampExtractor};
pub use variant::VariantExtractor;
pub use vocab::Vocabulary;

use crate::error::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// How transform output is rendered. Chosen per call, never global.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Array,
    Table,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Array(Array2<f64>),
    Table(FeatureMatrix),
}

impl Output {
    pub fn into_array(self) -> Array2<f64> {
        match self {
            Output::Array(a) => a,
            Output::Table(m) => m.into_values(),
        }
    }
}

/// Estimator contract: fit once on training data, then transform as a pure function.
pub trait Transformer {
    type Input: ?Sized;

    fn fit(&mut self, input: &Self::Input) -> Result<()>;

    fn transform(&self, input: &Self::Input) -> Result<FeatureMatrix>;

    /// Output column names, stable for a given configuration once fitted.
    fn feature_names_out(&self) -> Vec<String>;

    fn fit_transform(&mut self, input: &Self::Input) -> Result<FeatureMatrix> {
        self.fit(input)?;
        self.transform(input)
    }

    fn transform_with(&self, input: &Self::Input, format: OutputFormat) -> Result<Output> {
        let matrix = self.transform(input)?;
        Ok(match format {
            OutputFormat::Array => Output::Array(matrix.into_values()),
            OutputFormat::Table => Output::Table(matrix),
        })
    }
}
