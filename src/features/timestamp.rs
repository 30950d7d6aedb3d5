//! Time features per event: case-level durations and calendar encodings.

use super::{FeatureMatrix, Transformer};
use crate::config::TimestampConfig;
use crate::error::{FeatureError, Result};
use crate::event_log::EventLog;
use chrono::{DateTime, Datelike, Timelike, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFeature {
    /// Time since the case's first event
    AccumulatedTime,
    /// Time since the case's previous event
    ExecutionTime,
    /// Time until the case's last event; looks ahead, so only for labels
    RemainingTime,
    SecOfMin,
    MinOfHour,
    HourOfDay,
    DayOfWeek,
    DayOfMonth,
    DayOfYear,
    WeekOfYear,
    MonthOfYear,
    /// Normalized time of day
    SecsWithinDay,
    SecsSinceSunday,
    /// Unix time divided by the time unit
    NumericalTimestamp,
}

impl TimeFeature {
    /// Everything `FeatureSelection::All` expands to. `RemainingTime` is left out.
    pub const ALL: [TimeFeature; 13] = [
        TimeFeature::AccumulatedTime,
        TimeFeature::ExecutionTime,
        TimeFeature::SecOfMin,
        TimeFeature::MinOfHour,
        TimeFeature::HourOfDay,
        TimeFeature::DayOfWeek,
        TimeFeature::DayOfMonth,
        TimeFeature::DayOfYear,
        TimeFeature::WeekOfYear,
        TimeFeature::MonthOfYear,
        TimeFeature::SecsWithinDay,
        TimeFeature::SecsSinceSunday,
        TimeFeature::NumericalTimestamp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TimeFeature::AccumulatedTime => "accumulated_time",
            TimeFeature::ExecutionTime => "execution_time",
            TimeFeature::RemainingTime => "remaining_time",
            TimeFeature::SecOfMin => "sec_of_min",
            TimeFeature::MinOfHour => "min_of_hour",
            TimeFeature::HourOfDay => "hour_of_day",
            TimeFeature::DayOfWeek => "day_of_week",
            TimeFeature::DayOfMonth => "day_of_month",
            TimeFeature::DayOfYear => "day_of_year",
            TimeFeature::WeekOfYear => "week_of_year",
            TimeFeature::MonthOfYear => "month_of_year",
            TimeFeature::SecsWithinDay => "secs_within_day",
            TimeFeature::SecsSinceSunday => "secs_since_sunday",
            TimeFeature::NumericalTimestamp => "numerical_timestamp",
        }
    }

    /// Needs grouping by case.
    pub fn is_case_level(self) -> bool {
        matches!(
            self,
            TimeFeature::AccumulatedTime | TimeFeature::ExecutionTime | TimeFeature::RemainingTime
        )
    }

    /// Calendar encoding in [-0.5, 0.5], or the scaled Unix time.
    fn event_value(self, t: &DateTime<Utc>, unit: TimeUnit) -> f64 {
        let secs_of_day = t.num_seconds_from_midnight() as f64;
        match self {
            TimeFeature::SecOfMin => t.second() as f64 / 59.0 - 0.5,
            TimeFeature::MinOfHour => t.minute() as f64 / 59.0 - 0.5,
            TimeFeature::HourOfDay => t.hour() as f64 / 23.0 - 0.5,
            TimeFeature::DayOfWeek => t.weekday().num_days_from_monday() as f64 / 6.0 - 0.5,
            TimeFeature::DayOfMonth => (t.day() - 1) as f64 / 30.0 - 0.5,
            TimeFeature::DayOfYear => (t.ordinal() - 1) as f64 / 365.0 - 0.5,
            TimeFeature::WeekOfYear => (t.iso_week().week() - 1) as f64 / 52.0 - 0.5,
            TimeFeature::MonthOfYear => (t.month() - 1) as f64 / 11.0 - 0.5,
            TimeFeature::SecsWithinDay => secs_of_day / 86_400.0 - 0.5,
            TimeFeature::SecsSinceSunday => {
                let days = t.weekday().num_days_from_sunday() as f64;
                (days * 86_400.0 + secs_of_day) / 604_800.0 - 0.5
            }
            TimeFeature::NumericalTimestamp => t.timestamp() as f64 / unit.seconds(),
            TimeFeature::AccumulatedTime
            | TimeFeature::ExecutionTime
            | TimeFeature::RemainingTime => 0.0,
        }
    }
}

impl fmt::Display for TimeFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeFeature {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        TimeFeature::ALL
            .iter()
            .chain(std::iter::once(&TimeFeature::RemainingTime))
            .find(|f| f.name() == s)
            .copied()
            .ok_or_else(|| FeatureError::UnknownFeature(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    #[serde(alias = "s")]
    Seconds,
    #[serde(alias = "m")]
    Minutes,
    #[serde(alias = "h")]
    Hours,
    #[serde(alias = "d")]
    Days,
    #[serde(alias = "w")]
    Weeks,
}

impl TimeUnit {
    pub fn seconds(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Days => 86_400.0,
            TimeUnit::Weeks => 604_800.0,
        }
    }
}

/// Row order used inside a case when computing durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseOrdering {
    /// Use rows as given; non-monotonic cases are reported, not corrected
    #[default]
    AsGiven,
    /// Stable sort by timestamp inside each case
    SortByTimestamp,
    /// Fail on the first non-monotonic case
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    #[default]
    All,
    Only(Vec<TimeFeature>),
}

impl FeatureSelection {
    /// Parse a list of feature names; `["all"]` selects everything.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.len() == 1 && names[0].as_ref() == "all" {
            return Ok(FeatureSelection::All);
        }
        names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<_>>>()
            .map(FeatureSelection::Only)
    }

    /// Concrete feature list, deduplicated, first position kept.
    pub fn resolve(&self) -> Result<Vec<TimeFeature>> {
        let requested: &[TimeFeature] = match self {
            FeatureSelection::All => &TimeFeature::ALL,
            FeatureSelection::Only(list) => list,
        };
        let mut out: Vec<TimeFeature> = Vec::with_capacity(requested.len());
        for f in requested {
            if !out.contains(f) {
                out.push(*f);
            }
        }
        if out.is_empty() {
            return Err(FeatureError::NoFeaturesSelected);
        }
        Ok(out)
    }
}

/// Per-row durations in seconds.
struct CaseDurations {
    accumulated: Vec<f64>,
    execution: Vec<f64>,
    remaining: Vec<f64>,
}

fn seconds_between(from: &DateTime<Utc>, to: &DateTime<Utc>) -> f64 {
    (*to - *from).num_milliseconds() as f64 / 1_000.0
}

#[derive(Debug, Clone)]
pub struct TimestampExtractor {
    features: Vec<TimeFeature>,
    time_unit: TimeUnit,
    ordering: CaseOrdering,
    fitted: bool,
}

impl TimestampExtractor {
    pub fn new(config: TimestampConfig) -> Result<Self> {
        Ok(Self {
            features: config.features.resolve()?,
            time_unit: config.time_unit,
            ordering: config.ordering,
            fitted: false,
        })
    }

    pub fn features(&self) -> &[TimeFeature] {
        &self.features
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    fn case_durations(&self, log: &EventLog) -> Result<CaseDurations> {
        let events = log.events();
        let n = events.len();
        let mut d = CaseDurations {
            accumulated: vec![0.0; n],
            execution: vec![0.0; n],
            remaining: vec![0.0; n],
        };
        let mut non_monotonic = 0usize;

        for case in log.cases() {
            let mut rows = case.rows;
            let monotonic = rows
                .windows(2)
                .all(|w| events[w[0]].timestamp <= events[w[1]].timestamp);
            if !monotonic {
                match self.ordering {
                    CaseOrdering::AsGiven => non_monotonic += 1,
                    CaseOrdering::SortByTimestamp => rows.sort_by_key(|&r| events[r].timestamp),
                    CaseOrdering::Strict => {
                        return Err(FeatureError::NonMonotonicTimestamps {
                            case_id: case.id.to_string(),
                        })
                    }
                }
            }

            let (Some(&first), Some(&last)) = (rows.first(), rows.last()) else {
                continue;
            };
            let start = events[first].timestamp;
            let end = events[last].timestamp;
            let mut previous = start;
            for &row in &rows {
                let t = events[row].timestamp;
                d.accumulated[row] = seconds_between(&start, &t);
                d.execution[row] = seconds_between(&previous, &t);
                d.remaining[row] = seconds_between(&t, &end);
                previous = t;
            }
        }

        if non_monotonic > 0 {
            warn!(
                cases = non_monotonic,
                "non-monotonic timestamps within cases; durations follow the given row order"
            );
        }
        Ok(d)
    }
}

impl Transformer for TimestampExtractor {
    type Input = EventLog;

    fn fit(&mut self, log: &EventLog) -> Result<()> {
        debug!(
            events = log.len(),
            features = self.features.len(),
            "fitted timestamp extractor"
        );
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, log: &EventLog) -> Result<FeatureMatrix> {
        if !self.fitted {
            return Err(FeatureError::NotFitted("TimestampExtractor"));
        }
        let durations = if self.features.iter().any(|f| f.is_case_level()) {
            Some(self.case_durations(log)?)
        } else {
            None
        };

        let unit = self.time_unit.seconds();
        let scaled = |secs: &[f64]| Array1::from_iter(secs.iter().map(|s| s / unit));
        let mut values = Array2::<f64>::zeros((log.len(), self.features.len()));
        for (j, feature) in self.features.iter().enumerate() {
            let mut column = values.column_mut(j);
            match (feature, &durations) {
                (TimeFeature::AccumulatedTime, Some(d)) => column.assign(&scaled(&d.accumulated)),
                (TimeFeature::ExecutionTime, Some(d)) => column.assign(&scaled(&d.execution)),
                (TimeFeature::RemainingTime, Some(d)) => column.assign(&scaled(&d.remaining)),
                _ => {
                    for (cell, event) in column.iter_mut().zip(log.iter()) {
                        *cell = feature.event_value(&event.timestamp, self.time_unit);
                    }
                }
            }
        }

        FeatureMatrix::new(self.feature_names_out(), values)
    }

    fn feature_names_out(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name().to_string()).collect()
    }
}
