//! Pipeline configuration. Every transformer is built from one of these typed sections.

use crate::error::Result;
use crate::features::{
    AggregationMethod, CaseOrdering, CategoricalPolicy, FeatureSelection, NanPolicy,
    OutputFormat, PoolClustering, TimeUnit,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Column names used when ingesting CSV event logs
    pub columns: ColumnsConfig,
    /// Timestamp feature extraction
    pub timestamp: TimestampConfig,
    /// Resource pools; `None` disables the resource extractor
    pub resource: Option<ResourcePoolConfig>,
    /// Per-case aggregation
    pub aggregation: AggregationConfig,
    /// Rendering of transform output
    pub output: OutputFormat,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub case_id: String,
    pub activity: String,
    pub resource: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub features: FeatureSelection,
    pub time_unit: TimeUnit,
    /// How rows inside a case are ordered before durations are computed
    pub ordering: CaseOrdering,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcePoolConfig {
    pub clustering: PoolClustering,
    /// How the pipeline aggregates the pool-label column; independent of
    /// `AggregationConfig::categorical`
    pub aggregate_as: CategoricalPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub method: AggregationMethod,
    /// Restrict aggregation to these columns; all columns when `None`
    pub columns: Option<Vec<String>>,
    pub categorical: CategoricalPolicy,
    pub nan_policy: NanPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnsConfig::default(),
            timestamp: TimestampConfig::default(),
            resource: Some(ResourcePoolConfig::default()),
            aggregation: AggregationConfig::default(),
            output: OutputFormat::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            case_id: "case:concept:name".to_string(),
            activity: "concept:name".to_string(),
            resource: "org:resource".to_string(),
            timestamp: "time:timestamp".to_string(),
        }
    }
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            features: FeatureSelection::All,
            time_unit: TimeUnit::Seconds,
            ordering: CaseOrdering::AsGiven,
        }
    }
}

impl Default for ResourcePoolConfig {
    fn default() -> Self {
        Self {
            clustering: PoolClustering::default(),
            aggregate_as: CategoricalPolicy::Frequency,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            method: AggregationMethod::Mean,
            columns: None,
            categorical: CategoricalPolicy::Reject,
            nan_policy: NanPolicy::Error,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
