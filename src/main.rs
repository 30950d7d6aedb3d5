//! pm-features entrypoint: fit the case feature pipeline on a CSV event log and
//! write one JSON line per case to stdout.

use clap::{Parser, ValueEnum};
use pm_features::{
    config::PipelineConfig,
    features::{CaseFeaturePipeline, Output, OutputFormat, Transformer},
    logging::StructuredLogger,
    EventLog,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// `{"case_id": ..., "features": {...}}` per case
    Table,
    /// Bare JSON array of values per case
    Array,
}

#[derive(Debug, Parser)]
#[command(name = "pm-features", version, about = "Per-case features from a process-mining event log")]
struct Args {
    /// JSON pipeline configuration; defaults apply when the file does not exist
    #[arg(long, env = "PM_FEATURES_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// CSV event log
    #[arg(long)]
    input: PathBuf,

    /// Override the configured output format
    #[arg(long, value_enum)]
    format: Option<Format>,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let config = PipelineConfig::load(&args.config)?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = ?args.config, input = ?args.input, "pm-features starting");

    let log = EventLog::from_csv_path(&args.input, &config.columns)?;
    let mut pipeline = CaseFeaturePipeline::new(&config)?;
    pipeline.fit(&log)?;

    let format = match args.format {
        Some(Format::Table) => OutputFormat::Table,
        Some(Format::Array) => OutputFormat::Array,
        None => config.output,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match pipeline.transform_with(&log, format)? {
        Output::Table(matrix) => {
            for record in matrix.records() {
                StructuredLogger::emit_json(&record, &mut out)?;
            }
        }
        Output::Array(values) => {
            for row in values.outer_iter() {
                StructuredLogger::emit_json(&row.to_vec(), &mut out)?;
            }
        }
    }
    out.flush()?;

    info!(cases = log.case_ids().len(), "pm-features done");
    Ok(())
}
