//! Label helpers for predictive monitoring: remaining time and next activity.

use super::{CaseOrdering, FeatureSelection, TimeFeature, TimeUnit, TimestampExtractor, Transformer};
use crate::config::TimestampConfig;
use crate::error::Result;
use crate::event_log::EventLog;

/// Next-activity label of the last event in each case.
pub const END_OF_TRACE: &str = "<EOT>";

/// Time from each event to the end of its case.
pub fn remaining_time(log: &EventLog, time_unit: TimeUnit) -> Result<Vec<f64>> {
    let mut extractor = TimestampExtractor::new(TimestampConfig {
        features: FeatureSelection::Only(vec![TimeFeature::RemainingTime]),
        time_unit,
        ordering: CaseOrdering::AsGiven,
    })?;
    Ok(extractor.fit_transform(log)?.values().column(0).to_vec())
}

/// Activity of the following event in the same case.
pub fn next_activity(log: &EventLog) -> Vec<String> {
    let events = log.events();
    let mut out = vec![END_OF_TRACE.to_string(); events.len()];
    for case in log.cases() {
        for pair in case.rows.windows(2) {
            out[pair[0]] = events[pair[1]].activity.clone();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::Event;
    use chrono::{TimeZone, Utc};

    #[test]
    fn next_activity_ends_each_case() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let log: EventLog = vec![
            Event::new("1", "a", t),
            Event::new("2", "x", t),
            Event::new("1", "b", t),
        ]
        .into_iter()
        .collect();
        assert_eq!(next_activity(&log), vec!["b", END_OF_TRACE, END_OF_TRACE]);
    }

    #[test]
    fn remaining_time_counts_down_to_zero() {
        let log: EventLog = [0, 1, 3]
            .iter()
            .map(|h| Event::new("1", "a", Utc.with_ymd_and_hms(2024, 1, 1, *h, 0, 0).unwrap()))
            .collect();
        assert_eq!(remaining_time(&log, TimeUnit::Hours).unwrap(), vec![3.0, 2.0, 0.0]);
    }
}
