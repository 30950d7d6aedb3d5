//! Case feature pipeline: events → timestamp + resource features → per-case vector.

use super::{
    CaseFrame, FeatureMatrix, ResourcePoolExtractor, TimestampExtractor, TraceAggregator,
    Transformer,
};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::event_log::EventLog;
use tracing::info;

/// Frame column holding the pool label of each event.
pub const RESOURCE_POOL_COLUMN: &str = "resource_pool";

#[derive(Debug, Clone)]
pub struct CaseFeaturePipeline {
    timestamp: TimestampExtractor,
    resources: Option<ResourcePoolExtractor>,
    aggregator: TraceAggregator,
}

impl CaseFeaturePipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let mut aggregator = TraceAggregator::new(config.aggregation.clone());
        let resources = match &config.resource {
            Some(pools) => {
                aggregator = aggregator.with_column_policy(RESOURCE_POOL_COLUMN, pools.aggregate_as);
                Some(
                    ResourcePoolExtractor::new(pools.clone())?
                        .with_column(config.columns.resource.clone()),
                )
            }
            None => None,
        };
        Ok(Self {
            timestamp: TimestampExtractor::new(config.timestamp.clone())?,
            resources,
            aggregator,
        })
    }

    pub fn resources(&self) -> Option<&ResourcePoolExtractor> {
        self.resources.as_ref()
    }

    /// Event-level features of `log`, concatenated into one frame.
    pub fn frame(&self, log: &EventLog) -> Result<CaseFrame> {
        let mut frame = CaseFrame::from_log(log);
        frame.push_matrix(&self.timestamp.transform(log)?)?;
        if let Some(resources) = &self.resources {
            let assignment = resources.assign(log)?;
            frame.push_categorical(
                RESOURCE_POOL_COLUMN,
                assignment.labels.iter().map(ToString::to_string).collect(),
            )?;
        }
        Ok(frame)
    }
}

impl Transformer for CaseFeaturePipeline {
    type Input = EventLog;

    fn fit(&mut self, log: &EventLog) -> Result<()> {
        self.timestamp.fit(log)?;
        if let Some(resources) = self.resources.as_mut() {
            resources.fit(log)?;
        }
        let frame = self.frame(log)?;
        self.aggregator.fit(&frame)?;
        info!(
            events = log.len(),
            pools = ?self.resources.as_ref().and_then(ResourcePoolExtractor::n_pools),
            features = self.aggregator.feature_names_out().len(),
            "fitted case feature pipeline"
        );
        Ok(())
    }

    fn transform(&self, log: &EventLog) -> Result<FeatureMatrix> {
        self.aggregator.transform(&self.frame(log)?)
    }

    fn feature_names_out(&self) -> Vec<String> {
        self.aggregator.feature_names_out()
    }
}
