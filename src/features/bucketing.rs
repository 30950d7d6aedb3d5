//! Trace bucketing: assign each event to a bucket for per-bucket models.

use crate::event_log::EventLog;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucketing {
    /// Every event in `b1`
    #[default]
    Single,
    /// `b{n}` for the n-th event of its case
    Prefix,
}

impl Bucketing {
    pub fn buckets(self, log: &EventLog) -> Vec<String> {
        match self {
            Bucketing::Single => vec!["b1".to_string(); log.len()],
            Bucketing::Prefix => {
                let mut out = vec![String::new(); log.len()];
                for case in log.cases() {
                    for (pos, &row) in case.rows.iter().enumerate() {
                        out[row] = format!("b{}", pos + 1);
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::Event;
    use chrono::{TimeZone, Utc};

    #[test]
    fn prefix_buckets_count_position_in_case() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let log: EventLog = ["1", "2", "1", "1"]
            .iter()
            .map(|c| Event::new(*c, "a", t))
            .collect();
        assert_eq!(Bucketing::Prefix.buckets(&log), vec!["b1", "b1", "b2", "b3"]);
        assert_eq!(Bucketing::Single.buckets(&log), vec!["b1"; 4]);
    }
}
