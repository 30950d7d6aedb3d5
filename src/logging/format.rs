//! JSON lines: tracing subscriber setup and one-object-per-line feature output.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// One feature row, keyed by column name. NaN serializes as null.
#[derive(Debug, Serialize)]
pub struct RowRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<&'a str>,
    pub features: BTreeMap<&'a str, f64>,
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber; level from RUST_LOG or `default_level`.
    /// Writes to stderr, not stdout, since stdout carries the JSON feature lines.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    /// Write one value as a single JSON line.
    pub fn emit_json(value: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(value)?;
        writeln!(w, "{}", line)
    }
}
