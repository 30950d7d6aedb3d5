//! CSV ingestion with configurable column names.

use super::{Event, EventLog};
use crate::config::ColumnsConfig;
use crate::error::{FeatureError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const ZONED_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// Parse RFC 3339 or `%Y-%m-%d %H:%M:%S` (optionally fractional). Naive times are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(t) = DateTime::parse_from_str(s, fmt) {
            return Some(t.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|t| t.and_utc())
}

fn position(headers: &csv::StringRecord, column: &str) -> Option<usize> {
    headers.iter().position(|h| h == column)
}

fn required(headers: &csv::StringRecord, column: &str) -> Result<usize> {
    position(headers, column).ok_or_else(|| FeatureError::MissingColumn {
        column: column.to_string(),
    })
}

impl EventLog {
    pub fn from_csv_path(path: impl AsRef<Path>, columns: &ColumnsConfig) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_csv_reader(BufReader::new(file), columns)
    }

    /// Read events from CSV. Row numbers in errors count data rows from 0.
    pub fn from_csv_reader<R: Read>(reader: R, columns: &ColumnsConfig) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let case_ix = required(&headers, &columns.case_id)?;
        let activity_ix = required(&headers, &columns.activity)?;
        let timestamp_ix = required(&headers, &columns.timestamp)?;
        let resource_ix = position(&headers, &columns.resource);

        let mut events = Vec::new();
        for (row, result) in csv_reader.records().enumerate() {
            let record = result?;
            let field = |ix: usize| record.get(ix).map(str::trim).unwrap_or("");

            let case_id = field(case_ix);
            if case_id.is_empty() {
                return Err(FeatureError::MissingValue {
                    column: columns.case_id.clone(),
                    row,
                });
            }
            let activity = field(activity_ix);
            if activity.is_empty() {
                return Err(FeatureError::MissingValue {
                    column: columns.activity.clone(),
                    row,
                });
            }
            let raw_ts = field(timestamp_ix);
            let timestamp =
                parse_timestamp(raw_ts).ok_or_else(|| FeatureError::InvalidTimestamp {
                    row,
                    value: raw_ts.to_string(),
                })?;
            let resource = resource_ix
                .map(field)
                .filter(|r| !r.is_empty())
                .map(str::to_string);

            let attributes: BTreeMap<String, String> = headers
                .iter()
                .enumerate()
                .filter(|(ix, _)| {
                    *ix != case_ix
                        && *ix != activity_ix
                        && *ix != timestamp_ix
                        && Some(*ix) != resource_ix
                })
                .map(|(ix, name)| (name.to_string(), field(ix).to_string()))
                .collect();

            events.push(Event {
                case_id: case_id.to_string(),
                activity: activity.to_string(),
                timestamp,
                resource,
                attributes,
            });
        }

        tracing::debug!(events = events.len(), "loaded event log");
        Ok(EventLog::new(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CSV: &str = "\
case:concept:name,concept:name,org:resource,time:timestamp,cost
1,register,alice,2023-01-01 10:30:00,5
1,check,bob,2023-01-01 11:00:00,7
2,register,,2023-01-01T09:00:00Z,1
";

    #[test]
    fn reads_default_xes_columns() {
        let log = EventLog::from_csv_reader(CSV.as_bytes(), &ColumnsConfig::default()).unwrap();
        assert_eq!(log.len(), 3);
        let first = &log.events()[0];
        assert_eq!(first.case_id, "1");
        assert_eq!(first.resource.as_deref(), Some("alice"));
        assert_eq!(first.attributes.get("cost").map(String::as_str), Some("5"));
        assert_eq!(
            first.timestamp,
            Utc.with_ymd_and_hms(2023, 1, 1, 10, 30, 0).unwrap()
        );
        assert_eq!(log.events()[2].resource, None);
    }

    #[test]
    fn missing_timestamp_column_is_reported() {
        let columns = ColumnsConfig {
            timestamp: "ts".to_string(),
            ..ColumnsConfig::default()
        };
        let err = EventLog::from_csv_reader(CSV.as_bytes(), &columns).unwrap_err();
        assert!(matches!(err, FeatureError::MissingColumn { column } if column == "ts"));
    }

    #[test]
    fn bad_timestamp_is_labeled_with_row() {
        let data = "case:concept:name,concept:name,time:timestamp\n1,a,2023-01-01 00:00:00\n1,b,yesterday\n";
        let err = EventLog::from_csv_reader(data.as_bytes(), &ColumnsConfig::default()).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidTimestamp { row: 1, ref value } if value == "yesterday"));
    }

    #[test]
    fn parses_fractional_and_offset_timestamps() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2023-01-01 10:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2023-01-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp(""), None);
    }
}
