//! Structured logging and JSON-lines output.

mod format;

pub use format::{RowRecord, StructuredLogger};
