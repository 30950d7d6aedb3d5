//! pm-features: feature extraction transformers for process-mining event logs.
//!
//! Modular structure:
//! - [`event_log`]: Event/case model and CSV ingestion
//! - [`features`]: Timestamp, resource pool, aggregation, variant and bucketing transformers
//! - [`config`]: Typed configuration for every transformer
//! - [`error`]: Configuration, data-quality and I/O errors
//! - [`logging`]: Structured logging and JSON-lines output

pub mod config;
pub mod error;
pub mod event_log;
pub mod features;
pub mod logging;

pub use config::PipelineConfig;
pub use error::{FeatureError, Result};
pub use event_log::{Event, EventLog};
pub use features::{
    CaseFeaturePipeline, CaseFrame, FeatureMatrix, OutputFormat, ResourcePoolExtractor,
    TimestampExtractor, TraceAggregator, Transformer,
};
pub use logging::StructuredLogger;
