//! Trace aggregation: collapse each case's rows into one feature row.

use super::{CaseFrame, Column, FeatureMatrix, Transformer, Vocabulary};
use crate::config::AggregationConfig;
use crate::error::{FeatureError, Result};
use crate::event_log::group_cases;
use ndarray::{Array2, ArrayViewMut1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    #[default]
    Mean,
    Sum,
    Last,
    Max,
    Min,
    Median,
    /// Euclidean norm
    Norm,
}

impl AggregationMethod {
    pub const ALL: [AggregationMethod; 7] = [
        AggregationMethod::Mean,
        AggregationMethod::Sum,
        AggregationMethod::Last,
        AggregationMethod::Max,
        AggregationMethod::Min,
        AggregationMethod::Median,
        AggregationMethod::Norm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AggregationMethod::Mean => "mean",
            AggregationMethod::Sum => "sum",
            AggregationMethod::Last => "last",
            AggregationMethod::Max => "max",
            AggregationMethod::Min => "min",
            AggregationMethod::Median => "median",
            AggregationMethod::Norm => "norm",
        }
    }

    /// Reduce values in row order. NaN for an empty slice.
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        match self {
            AggregationMethod::Mean => values.iter().sum::<f64>() / values.len() as f64,
            AggregationMethod::Sum => values.iter().sum(),
            AggregationMethod::Last => values[values.len() - 1],
            AggregationMethod::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationMethod::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationMethod::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            AggregationMethod::Norm => values.iter().map(|v| v * v).sum::<f64>().sqrt(),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationMethod {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        AggregationMethod::ALL
            .iter()
            .find(|m| m.name() == s)
            .copied()
            .ok_or_else(|| FeatureError::UnknownMethod(s.to_string()))
    }
}

/// What to do with non-numeric columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalPolicy {
    /// Fail at fit, naming the column
    #[default]
    Reject,
    /// Drop with a warning
    Exclude,
    /// One column per category: count (sum) or share (other methods)
    Frequency,
    /// Vocabulary code of the most frequent category, 0 for unseen
    Mode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NanPolicy {
    #[default]
    Error,
    /// Ignore missing values; an all-missing case yields NaN
    Skip,
}

#[derive(Debug, Clone)]
enum FittedColumn {
    Numeric(String),
    Frequency(String, Vocabulary),
    Mode(String, Vocabulary),
}

impl FittedColumn {
    fn name(&self) -> &str {
        match self {
            FittedColumn::Numeric(n) | FittedColumn::Frequency(n, _) | FittedColumn::Mode(n, _) => n,
        }
    }

    fn width(&self) -> usize {
        match self {
            FittedColumn::Frequency(_, vocab) => vocab.len() + 1,
            _ => 1,
        }
    }

    fn output_names(&self) -> Vec<String> {
        match self {
            FittedColumn::Numeric(n) | FittedColumn::Mode(n, _) => vec![n.clone()],
            FittedColumn::Frequency(n, vocab) => vocab
                .labels()
                .iter()
                .map(|c| format!("{}={}", n, c))
                .chain(std::iter::once(format!("{}=UNK", n)))
                .collect(),
        }
    }
}

/// Columns of `frame` borrowed according to the fitted schema.
enum Source<'a> {
    Numeric(&'a [f64]),
    Categorical(&'a [String]),
}

#[derive(Debug, Clone)]
pub struct TraceAggregator {
    config: AggregationConfig,
    /// Per-column overrides of `config.categorical`
    policies: HashMap<String, CategoricalPolicy>,
    schema: Option<Vec<FittedColumn>>,
}

impl TraceAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self {
            config,
            policies: HashMap::new(),
            schema: None,
        }
    }

    /// Aggregate the categorical column `name` with `policy` instead of the configured one.
    pub fn with_column_policy(mut self, name: impl Into<String>, policy: CategoricalPolicy) -> Self {
        self.policies.insert(name.into(), policy);
        self
    }

    pub fn method(&self) -> AggregationMethod {
        self.config.method
    }

    fn schema(&self) -> Result<&[FittedColumn]> {
        self.schema
            .as_deref()
            .ok_or(FeatureError::NotFitted("TraceAggregator"))
    }

    fn sources<'a>(&self, frame: &'a CaseFrame) -> Result<Vec<Source<'a>>> {
        self.schema()?
            .iter()
            .map(|fc| {
                let column = frame.column(fc.name()).ok_or_else(|| FeatureError::MissingColumn {
                    column: fc.name().to_string(),
                })?;
                match (fc, column) {
                    (FittedColumn::Numeric(_), Column::Numeric(v)) => Ok(Source::Numeric(v.as_slice())),
                    (FittedColumn::Numeric(n), Column::Categorical(_)) => {
                        Err(FeatureError::CategoricalColumn { column: n.clone() })
                    }
                    (_, Column::Categorical(v)) => Ok(Source::Categorical(v.as_slice())),
                    (_, Column::Numeric(_)) => Err(FeatureError::InvalidConfig(format!(
                        "column '{}' was categorical during fit",
                        fc.name()
                    ))),
                }
            })
            .collect()
    }

    /// Write the aggregate of `rows` into `out`. Returns the number of unseen categories.
    fn aggregate_rows(
        &self,
        schema: &[FittedColumn],
        sources: &[Source<'_>],
        rows: &[usize],
        mut out: ArrayViewMut1<'_, f64>,
        all_missing: &mut usize,
    ) -> Result<usize> {
        let method = self.config.method;
        let mut offset = 0;
        let mut unseen = 0;
        for (fc, source) in schema.iter().zip(sources) {
            match (fc, source) {
                (FittedColumn::Numeric(name), Source::Numeric(values)) => {
                    let mut picked = Vec::with_capacity(rows.len());
                    for &row in rows {
                        let v = values[row];
                        if v.is_nan() {
                            if self.config.nan_policy == NanPolicy::Error {
                                return Err(FeatureError::MissingValue {
                                    column: name.clone(),
                                    row,
                                });
                            }
                            continue;
                        }
                        picked.push(v);
                    }
                    if picked.is_empty() && !rows.is_empty() {
                        *all_missing += 1;
                    }
                    out[offset] = method.apply(&picked);
                }
                (FittedColumn::Frequency(_, vocab), Source::Categorical(values)) => {
                    let unk = vocab.len();
                    for &row in rows {
                        let slot = vocab.get(&values[row]).unwrap_or_else(|| {
                            unseen += 1;
                            unk
                        });
                        out[offset + slot] += 1.0;
                    }
                    if method != AggregationMethod::Sum && !rows.is_empty() {
                        for slot in 0..=unk {
                            out[offset + slot] /= rows.len() as f64;
                        }
                    }
                }
                (FittedColumn::Mode(_, vocab), Source::Categorical(values)) => {
                    // category -> (count, first position in case)
                    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
                    for (pos, &row) in rows.iter().enumerate() {
                        let category = values[row].as_str();
                        if !vocab.contains(category) {
                            unseen += 1;
                        }
                        counts.entry(category).or_insert((0, pos)).0 += 1;
                    }
                    // unseen winner encodes as 0
                    let mode = counts
                        .into_iter()
                        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
                        .map(|(category, _)| vocab.get(category).map_or(0.0, |ix| (ix + 1) as f64))
                        .unwrap_or(f64::NAN);
                    out[offset] = mode;
                }
                _ => {
                    return Err(FeatureError::InvalidConfig(format!(
                        "column '{}' does not match its fitted kind",
                        fc.name()
                    )))
                }
            }
            offset += fc.width();
        }
        Ok(unseen)
    }

    fn report(&self, unseen: usize, all_missing: usize) {
        if unseen > 0 {
            warn!(values = unseen, "categories unseen during fit aggregated as UNK");
        }
        if all_missing > 0 {
            warn!(groups = all_missing, "all values missing; aggregate left as NaN");
        }
    }

    /// Rolling aggregation over each event's case prefix, the last `window` rows
    /// when given. One output row per event.
    pub fn transform_prefixes(&self, frame: &CaseFrame, window: Option<usize>) -> Result<FeatureMatrix> {
        if window == Some(0) {
            return Err(FeatureError::InvalidConfig(
                "prefix window must be at least 1".to_string(),
            ));
        }
        let schema = self.schema()?;
        let sources = self.sources(frame)?;
        let width = schema.iter().map(FittedColumn::width).sum();
        let mut values = Array2::<f64>::zeros((frame.len(), width));
        let (mut unseen, mut all_missing) = (0, 0);
        for case in frame.cases() {
            for k in 0..case.rows.len() {
                let start = window.map(|w| (k + 1).saturating_sub(w)).unwrap_or(0);
                let row = case.rows[k];
                unseen += self.aggregate_rows(
                    schema,
                    &sources,
                    &case.rows[start..=k],
                    values.row_mut(row),
                    &mut all_missing,
                )?;
            }
        }
        self.report(unseen, all_missing);
        FeatureMatrix::new(self.feature_names_out(), values)
    }
}

impl Transformer for TraceAggregator {
    type Input = CaseFrame;

    fn fit(&mut self, frame: &CaseFrame) -> Result<()> {
        let selected: Vec<&str> = match &self.config.columns {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => frame.column_names().collect(),
        };

        let mut schema = Vec::with_capacity(selected.len());
        let mut excluded = Vec::new();
        for name in selected {
            let column = frame.column(name).ok_or_else(|| FeatureError::MissingColumn {
                column: name.to_string(),
            })?;
            let values = match column {
                Column::Numeric(_) => {
                    schema.push(FittedColumn::Numeric(name.to_string()));
                    continue;
                }
                Column::Categorical(values) => values,
            };
            let policy = self
                .policies
                .get(name)
                .copied()
                .unwrap_or(self.config.categorical);
            match policy {
                CategoricalPolicy::Reject => {
                    return Err(FeatureError::CategoricalColumn {
                        column: name.to_string(),
                    })
                }
                CategoricalPolicy::Exclude => excluded.push(name.to_string()),
                CategoricalPolicy::Frequency => schema.push(FittedColumn::Frequency(
                    name.to_string(),
                    values.iter().map(String::as_str).collect(),
                )),
                CategoricalPolicy::Mode => schema.push(FittedColumn::Mode(
                    name.to_string(),
                    values.iter().map(String::as_str).collect(),
                )),
            }
        }

        if !excluded.is_empty() {
            warn!(columns = ?excluded, "categorical columns excluded from aggregation");
        }
        debug!(
            columns = schema.len(),
            method = %self.config.method,
            "fitted trace aggregator"
        );
        self.schema = Some(schema);
        Ok(())
    }

    fn transform(&self, frame: &CaseFrame) -> Result<FeatureMatrix> {
        let schema = self.schema()?;
        let sources = self.sources(frame)?;
        let cases = frame.cases();
        let width = schema.iter().map(FittedColumn::width).sum();
        let mut values = Array2::<f64>::zeros((cases.len(), width));
        let (mut unseen, mut all_missing) = (0, 0);
        for (i, case) in cases.iter().enumerate() {
            unseen += self.aggregate_rows(schema, &sources, &case.rows, values.row_mut(i), &mut all_missing)?;
        }
        self.report(unseen, all_missing);

        let index = cases.iter().map(|c| c.id.to_string()).collect();
        FeatureMatrix::new(self.feature_names_out(), values)?.with_index(index)
    }

    fn feature_names_out(&self) -> Vec<String> {
        self.schema
            .as_deref()
            .unwrap_or_default()
            .iter()
            .flat_map(FittedColumn::output_names)
            .collect()
    }
}

/// Re-expand case rows to event rows: every event gets its case's aggregate.
pub fn broadcast(aggregated: &FeatureMatrix, frame: &CaseFrame) -> Result<FeatureMatrix> {
    let index = aggregated.index().ok_or_else(|| {
        FeatureError::InvalidConfig("broadcast needs a matrix indexed by case id".to_string())
    })?;
    let position: HashMap<&str, usize> = index
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut values = Array2::<f64>::zeros((frame.len(), aggregated.ncols()));
    for case in group_cases(frame.case_ids().iter().map(String::as_str)) {
        let source = *position
            .get(case.id)
            .ok_or_else(|| FeatureError::MissingValue {
                column: "case_id".to_string(),
                row: case.rows[0],
            })?;
        for &row in &case.rows {
            values.row_mut(row).assign(&aggregated.values().row(source));
        }
    }
    FeatureMatrix::new(aggregated.columns().to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> CaseFrame {
        let mut f = CaseFrame::new(
            ["a", "b", "a", "a", "b"].iter().map(|s| s.to_string()).collect(),
        );
        f.push_numeric("x", vec![1.0, 10.0, 2.0, 6.0, 20.0]).unwrap();
        f
    }

    fn fitted(config: AggregationConfig, frame: &CaseFrame) -> TraceAggregator {
        let mut agg = TraceAggregator::new(config);
        agg.fit(frame).unwrap();
        agg
    }

    fn with_method(method: AggregationMethod) -> AggregationConfig {
        AggregationConfig {
            method,
            ..AggregationConfig::default()
        }
    }

    #[test]
    fn methods_reduce_per_case_in_first_occurrence_order() {
        let f = frame();
        let expect = [
            (AggregationMethod::Mean, [3.0, 15.0]),
            (AggregationMethod::Sum, [9.0, 30.0]),
            (AggregationMethod::Last, [6.0, 20.0]),
            (AggregationMethod::Max, [6.0, 20.0]),
            (AggregationMethod::Min, [1.0, 10.0]),
            (AggregationMethod::Median, [2.0, 15.0]),
            (AggregationMethod::Norm, [41f64.sqrt(), 500f64.sqrt()]),
        ];
        for (method, values) in expect {
            let m = fitted(with_method(method), &f).transform(&f).unwrap();
            assert_eq!(m.index().unwrap(), &["a".to_string(), "b".to_string()]);
            assert_eq!(m.column("x").unwrap().to_vec(), values.to_vec(), "{}", method);
        }
    }

    #[test]
    fn unknown_method_name_is_rejected() {
        let err = "average".parse::<AggregationMethod>().unwrap_err();
        assert!(matches!(err, FeatureError::UnknownMethod(_)));
        assert_eq!("max".parse::<AggregationMethod>().unwrap(), AggregationMethod::Max);
    }

    #[test]
    fn categorical_columns_need_a_policy() {
        let mut f = frame();
        f.push_categorical("pool", ["p", "q", "p", "q", "q"].iter().map(|s| s.to_string()).collect())
            .unwrap();
        let mut agg = TraceAggregator::new(AggregationConfig::default());
        let err = agg.fit(&f).unwrap_err();
        assert!(matches!(err, FeatureError::CategoricalColumn { column } if column == "pool"));

        let excluded = fitted(
            AggregationConfig {
                categorical: CategoricalPolicy::Exclude,
                ..AggregationConfig::default()
            },
            &f,
        );
        assert_eq!(excluded.feature_names_out(), vec!["x".to_string()]);
    }

    #[test]
    fn frequency_policy_counts_or_shares_categories() {
        let mut f = frame();
        f.push_categorical("pool", ["p", "q", "p", "q", "q"].iter().map(|s| s.to_string()).collect())
            .unwrap();
        let config = AggregationConfig {
            method: AggregationMethod::Sum,
            categorical: CategoricalPolicy::Frequency,
            ..AggregationConfig::default()
        };
        let agg = fitted(config, &f);
        assert_eq!(
            agg.feature_names_out(),
            vec!["x", "pool=p", "pool=q", "pool=UNK"]
        );
        let m = agg.transform(&f).unwrap();
        assert_eq!(m.values().row(0).to_vec(), vec![9.0, 2.0, 1.0, 0.0]);
        assert_eq!(m.values().row(1).to_vec(), vec![30.0, 0.0, 2.0, 0.0]);

        let mut test = CaseFrame::new(vec!["z".to_string(), "z".to_string()]);
        test.push_numeric("x", vec![1.0, 1.0]).unwrap();
        test.push_categorical("pool", vec!["p".to_string(), "new".to_string()]).unwrap();
        let mean = fitted(
            AggregationConfig {
                categorical: CategoricalPolicy::Frequency,
                ..AggregationConfig::default()
            },
            &f,
        );
        let m = mean.transform(&test).unwrap();
        assert_eq!(m.values().row(0).to_vec(), vec![1.0, 0.5, 0.0, 0.5]);
    }

    #[test]
    fn mode_policy_breaks_ties_by_first_appearance() {
        let mut f = CaseFrame::new(vec!["a".to_string(); 4]);
        f.push_categorical(
            "pool",
            ["q", "p", "p", "q"].iter().map(|s| s.to_string()).collect(),
        )
        .unwrap();
        let agg = fitted(
            AggregationConfig {
                categorical: CategoricalPolicy::Mode,
                ..AggregationConfig::default()
            },
            &f,
        );
        let m = agg.transform(&f).unwrap();
        // vocabulary: q -> 1, p -> 2; tie 2:2 goes to q, seen first
        assert_eq!(m.column("pool").unwrap().to_vec(), vec![1.0]);
    }

    #[test]
    fn norm_is_euclidean_length() {
        let mut f = CaseFrame::new(vec!["a".to_string(), "a".to_string()]);
        f.push_numeric("x", vec![3.0, 4.0]).unwrap();
        let m = fitted(with_method(AggregationMethod::Norm), &f).transform(&f).unwrap();
        assert_eq!(m.values().row(0).to_vec(), vec![5.0]);
    }

    #[test]
    fn mode_counts_unseen_categories_separately() {
        let mut train = CaseFrame::new(vec!["a".to_string(), "a".to_string()]);
        train.push_categorical("pool", vec!["p".to_string(), "q".to_string()]).unwrap();
        let agg = fitted(
            AggregationConfig {
                categorical: CategoricalPolicy::Mode,
                ..AggregationConfig::default()
            },
            &train,
        );

        let mut test = CaseFrame::new(vec!["z".to_string(); 3]);
        test.push_categorical("pool", ["p", "x", "y"].iter().map(|s| s.to_string()).collect())
            .unwrap();
        assert_eq!(agg.transform(&test).unwrap().column("pool").unwrap().to_vec(), vec![1.0]);

        let mut test = CaseFrame::new(vec!["z".to_string(); 3]);
        test.push_categorical("pool", ["x", "q", "x"].iter().map(|s| s.to_string()).collect())
            .unwrap();
        assert_eq!(agg.transform(&test).unwrap().column("pool").unwrap().to_vec(), vec![0.0]);
    }

    #[test]
    fn column_policy_overrides_the_default() {
        let mut f = frame();
        f.push_categorical("pool", ["p", "q", "p", "q", "q"].iter().map(|s| s.to_string()).collect())
            .unwrap();
        let mut agg = TraceAggregator::new(AggregationConfig::default())
            .with_column_policy("pool", CategoricalPolicy::Mode);
        agg.fit(&f).unwrap();
        assert_eq!(agg.feature_names_out(), vec!["x", "pool"]);
    }

    #[test]
    fn nan_policy_errors_or_skips() {
        let mut f = CaseFrame::new(vec!["a".to_string(), "a".to_string()]);
        f.push_numeric("x", vec![f64::NAN, 4.0]).unwrap();

        let mut strict = TraceAggregator::new(AggregationConfig::default());
        strict.fit(&f).unwrap();
        let err = strict.transform(&f).unwrap_err();
        assert!(matches!(err, FeatureError::MissingValue { row: 0, .. }));

        let skip = fitted(
            AggregationConfig {
                nan_policy: NanPolicy::Skip,
                ..AggregationConfig::default()
            },
            &f,
        );
        assert_eq!(skip.transform(&f).unwrap().column("x").unwrap().to_vec(), vec![4.0]);
    }

    #[test]
    fn missing_column_is_reported() {
        let f = frame();
        let mut agg = TraceAggregator::new(AggregationConfig {
            columns: Some(vec!["y".to_string()]),
            ..AggregationConfig::default()
        });
        let err = agg.fit(&f).unwrap_err();
        assert!(matches!(err, FeatureError::MissingColumn { column } if column == "y"));

        let agg = fitted(AggregationConfig::default(), &f);
        let other = CaseFrame::new(vec!["a".to_string()]);
        assert!(matches!(
            agg.transform(&other).unwrap_err(),
            FeatureError::MissingColumn { .. }
        ));
    }

    #[test]
    fn prefixes_roll_within_cases() {
        let f = frame();
        let agg = fitted(with_method(AggregationMethod::Sum), &f);
        let all = agg.transform_prefixes(&f, None).unwrap();
        assert_eq!(all.column("x").unwrap().to_vec(), vec![1.0, 10.0, 3.0, 9.0, 30.0]);
        let last_two = agg.transform_prefixes(&f, Some(2)).unwrap();
        assert_eq!(last_two.column("x").unwrap().to_vec(), vec![1.0, 10.0, 3.0, 8.0, 30.0]);
        assert!(agg.transform_prefixes(&f, Some(0)).is_err());
    }

    #[test]
    fn broadcast_fills_each_event_with_its_case_row() {
        let f = frame();
        let agg = fitted(with_method(AggregationMethod::Mean), &f);
        let per_case = agg.transform(&f).unwrap();
        let per_event = broadcast(&per_case, &f).unwrap();
        assert_eq!(per_event.column("x").unwrap().to_vec(), vec![3.0, 15.0, 3.0, 3.0, 15.0]);
    }
}
