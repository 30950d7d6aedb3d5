//! Resource pools: cluster resources by the activities they perform.

use super::{FeatureMatrix, Transformer, Vocabulary};
use crate::config::{ColumnsConfig, ResourcePoolConfig};
use crate::error::{FeatureError, Result};
use crate::event_log::EventLog;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use tracing::{debug, warn};

const FEATURE_NAME: &str = "resource_pool";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolLabel {
    Pool(usize),
    /// Resource not seen during fit
    Unknown,
}

impl PoolLabel {
    /// Numeric code: `Unknown` is 0, pools start at 1.
    pub fn code(self) -> f64 {
        match self {
            PoolLabel::Pool(i) => (i + 1) as f64,
            PoolLabel::Unknown => 0.0,
        }
    }
}

impl fmt::Display for PoolLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolLabel::Pool(i) => write!(f, "pool_{}", i),
            PoolLabel::Unknown => f.write_str("UNK"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolClustering {
    /// Link resources whose activity profiles correlate above `threshold`;
    /// pools are the connected components.
    CorrelationThreshold { threshold: f64 },
    /// k-means++ over normalized activity profiles.
    KMeans {
        n_pools: usize,
        seed: u64,
        max_iterations: usize,
    },
}

impl Default for PoolClustering {
    fn default() -> Self {
        PoolClustering::CorrelationThreshold { threshold: 0.7 }
    }
}

impl PoolClustering {
    fn validate(&self) -> Result<()> {
        match *self {
            PoolClustering::CorrelationThreshold { threshold } => {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(FeatureError::InvalidConfig(format!(
                        "correlation threshold must be in [0, 1], got {}",
                        threshold
                    )));
                }
            }
            PoolClustering::KMeans { n_pools, .. } => {
                if n_pools == 0 {
                    return Err(FeatureError::InvalidConfig(
                        "k-means needs at least one pool".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Raw cluster id per profile row.
    fn cluster(&self, profiles: &Array2<f64>) -> Vec<usize> {
        match *self {
            PoolClustering::CorrelationThreshold { threshold } => {
                correlation_components(profiles, threshold)
            }
            PoolClustering::KMeans {
                n_pools,
                seed,
                max_iterations,
            } => kmeans(profiles, n_pools, seed, max_iterations),
        }
    }
}

/// Labels and categories that were not seen during fit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub unseen_resources: BTreeSet<String>,
    pub unseen_activities: BTreeSet<String>,
}

impl DriftReport {
    pub fn is_empty(&self) -> bool {
        self.unseen_resources.is_empty() && self.unseen_activities.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolAssignment {
    /// One label per event, row-aligned with the log
    pub labels: Vec<PoolLabel>,
    pub drift: DriftReport,
}

#[derive(Debug, Clone)]
struct FittedPools {
    activities: Vocabulary,
    resources: Vocabulary,
    /// Pool per resource, indexed like `resources`
    pools: Vec<usize>,
    n_pools: usize,
}

#[derive(Debug, Clone)]
pub struct ResourcePoolExtractor {
    clustering: PoolClustering,
    /// Source column name, used in error reports
    column: String,
    fitted: Option<FittedPools>,
}

impl ResourcePoolExtractor {
    pub fn new(config: ResourcePoolConfig) -> Result<Self> {
        config.clustering.validate()?;
        Ok(Self {
            clustering: config.clustering,
            column: ColumnsConfig::default().resource,
            fitted: None,
        })
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// A log without any resource lacks the column; a single gap is a missing value.
    fn check_resources(&self, log: &EventLog) -> Result<()> {
        if !log.is_empty() && log.iter().all(|e| e.resource.is_none()) {
            return Err(FeatureError::MissingColumn {
                column: self.column.clone(),
            });
        }
        Ok(())
    }

    fn resource_of<'a>(&self, log: &'a EventLog, row: usize) -> Result<&'a str> {
        log.events()[row]
            .resource
            .as_deref()
            .ok_or_else(|| FeatureError::MissingValue {
                column: self.column.clone(),
                row,
            })
    }

    pub fn n_pools(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.n_pools)
    }

    pub fn pool_of(&self, resource: &str) -> PoolLabel {
        self.fitted
            .as_ref()
            .and_then(|f| f.resources.get(resource).map(|ix| PoolLabel::Pool(f.pools[ix])))
            .unwrap_or(PoolLabel::Unknown)
    }

    /// Label every event. Unseen resources map to `Unknown` and are reported, not rejected.
    pub fn assign(&self, log: &EventLog) -> Result<PoolAssignment> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(FeatureError::NotFitted("ResourcePoolExtractor"))?;

        self.check_resources(log)?;
        let mut drift = DriftReport::default();
        let mut labels = Vec::with_capacity(log.len());
        for (row, event) in log.iter().enumerate() {
            let resource = self.resource_of(log, row)?;
            if !fitted.activities.contains(&event.activity) {
                drift.unseen_activities.insert(event.activity.clone());
            }
            match fitted.resources.get(resource) {
                Some(ix) => labels.push(PoolLabel::Pool(fitted.pools[ix])),
                None => {
                    drift.unseen_resources.insert(resource.to_string());
                    labels.push(PoolLabel::Unknown);
                }
            }
        }

        if !drift.is_empty() {
            warn!(
                unseen_resources = ?drift.unseen_resources,
                unseen_activities = ?drift.unseen_activities,
                "values unseen during fit mapped to UNK"
            );
        }
        Ok(PoolAssignment { labels, drift })
    }
}

impl Transformer for ResourcePoolExtractor {
    type Input = EventLog;

    fn fit(&mut self, log: &EventLog) -> Result<()> {
        self.check_resources(log)?;
        let mut activities = Vocabulary::new();
        let mut resources = Vocabulary::new();
        let mut pairs = Vec::with_capacity(log.len());
        for (row, event) in log.iter().enumerate() {
            let r = resources.insert(self.resource_of(log, row)?);
            let a = activities.insert(&event.activity);
            pairs.push((r, a));
        }

        // rows = resources, columns = activities
        let mut profiles = Array2::<f64>::zeros((resources.len(), activities.len()));
        for (r, a) in pairs {
            profiles[[r, a]] += 1.0;
        }

        let (pools, n_pools) = densify(&self.clustering.cluster(&profiles));
        debug!(
            resources = resources.len(),
            activities = activities.len(),
            pools = n_pools,
            "fitted resource pools"
        );
        self.fitted = Some(FittedPools {
            activities,
            resources,
            pools,
            n_pools,
        });
        Ok(())
    }

    fn transform(&self, log: &EventLog) -> Result<FeatureMatrix> {
        let assignment = self.assign(log)?;
        let values = Array2::from_shape_fn((assignment.labels.len(), 1), |(i, _)| {
            assignment.labels[i].code()
        });
        FeatureMatrix::new(self.feature_names_out(), values)
    }

    fn feature_names_out(&self) -> Vec<String> {
        vec![FEATURE_NAME.to_string()]
    }
}

/// Renumber cluster ids 0.. in first-occurrence order.
fn densify(raw: &[usize]) -> (Vec<usize>, usize) {
    let mut seen: Vec<usize> = Vec::new();
    let dense = raw
        .iter()
        .map(|id| match seen.iter().position(|s| s == id) {
            Some(p) => p,
            None => {
                seen.push(*id);
                seen.len() - 1
            }
        })
        .collect();
    (dense, seen.len())
}

/// Pearson correlation; `None` when either profile has zero variance.
fn pearson(a: ndarray::ArrayView1<'_, f64>, b: ndarray::ArrayView1<'_, f64>) -> Option<f64> {
    let n = a.len() as f64;
    if n == 0.0 {
        return None;
    }
    let (mean_a, mean_b) = (a.sum() / n, b.sum() / n);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a * var_b).sqrt())
}

fn correlation_components(profiles: &Array2<f64>, threshold: f64) -> Vec<usize> {
    let n = profiles.nrows();
    let linked = |i: usize, j: usize| {
        i != j
            && pearson(profiles.row(i), profiles.row(j))
                .map(|c| c > threshold)
                .unwrap_or(false)
    };

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut next = 0;
    for start in 0..n {
        if labels[start].is_some() {
            continue;
        }
        labels[start] = Some(next);
        let mut queue = VecDeque::from([start]);
        while let Some(i) = queue.pop_front() {
            for j in 0..n {
                if labels[j].is_none() && linked(i, j) {
                    labels[j] = Some(next);
                    queue.push_back(j);
                }
            }
        }
        next += 1;
    }
    labels.into_iter().map(|l| l.unwrap_or(0)).collect()
}

fn squared_distance(a: ndarray::ArrayView1<'_, f64>, b: ndarray::ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: ndarray::ArrayView1<'_, f64>, centroids: &Array2<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.outer_iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    best
}

fn kmeans(profiles: &Array2<f64>, n_pools: usize, seed: u64, max_iterations: usize) -> Vec<usize> {
    let n = profiles.nrows();
    if n == 0 {
        return Vec::new();
    }
    // Activity shares, so busy and idle resources with the same mix land together.
    let mut points = profiles.clone();
    for mut row in points.outer_iter_mut() {
        let total = row.sum();
        if total > 0.0 {
            row /= total;
        }
    }

    let k = n_pools.min(n);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids = Array2::<f64>::zeros((k, points.ncols()));
    centroids.row_mut(0).assign(&points.row(rng.gen_range(0..n)));
    for c in 1..k {
        let dists: Vec<f64> = points
            .outer_iter()
            .map(|p| {
                (0..c)
                    .map(|j| squared_distance(p, centroids.row(j)))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = dists.iter().sum();
        let pick = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            dists
                .iter()
                .position(|d| {
                    target -= d;
                    target <= 0.0
                })
                .unwrap_or(n - 1)
        } else {
            rng.gen_range(0..n)
        };
        centroids.row_mut(c).assign(&points.row(pick));
    }

    let mut assignments = vec![usize::MAX; n];
    for _ in 0..max_iterations.max(1) {
        let mut changed = false;
        for (i, p) in points.outer_iter().enumerate() {
            let c = nearest(p, &centroids);
            if c != assignments[i] {
                assignments[i] = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        for c in 0..k {
            let members: Vec<usize> = (0..n).filter(|&i| assignments[i] == c).collect();
            // Empty clusters keep their previous centroid.
            if members.is_empty() {
                continue;
            }
            let mut mean = ndarray::Array1::<f64>::zeros(points.ncols());
            for &i in &members {
                mean += &points.row(i);
            }
            mean /= members.len() as f64;
            centroids.row_mut(c).assign(&mean);
        }
    }
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::Event;
    use chrono::{TimeZone, Utc};

    fn log(rows: &[(&str, &str)]) -> EventLog {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        rows.iter()
            .enumerate()
            .map(|(i, (activity, resource))| {
                Event::new(format!("c{}", i / 2), *activity, t).with_resource(*resource)
            })
            .collect()
    }

    fn fitted(clustering: PoolClustering, train: &EventLog) -> ResourcePoolExtractor {
        let mut e = ResourcePoolExtractor::new(ResourcePoolConfig {
            clustering,
            ..ResourcePoolConfig::default()
        })
        .unwrap();
        e.fit(train).unwrap();
        e
    }

    fn two_groups() -> EventLog {
        log(&[
            ("A", "R1"),
            ("B", "R2"),
            ("A", "R1"),
            ("B", "R2"),
            ("A", "R3"),
            ("B", "R4"),
        ])
    }

    #[test]
    fn correlated_resources_share_a_pool() {
        let e = fitted(PoolClustering::default(), &two_groups());
        assert_eq!(e.n_pools(), Some(2));
        assert_eq!(e.pool_of("R1"), PoolLabel::Pool(0));
        assert_eq!(e.pool_of("R3"), PoolLabel::Pool(0));
        assert_eq!(e.pool_of("R2"), PoolLabel::Pool(1));
        assert_eq!(e.pool_of("R4"), PoolLabel::Pool(1));
    }

    #[test]
    fn transform_emits_codes_with_unknown_as_zero() {
        let e = fitted(PoolClustering::default(), &two_groups());
        let test = log(&[("A", "R1"), ("B", "R9")]);
        let m = e.transform(&test).unwrap();
        assert_eq!(m.columns(), &["resource_pool".to_string()]);
        assert_eq!(m.column("resource_pool").unwrap().to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn unseen_values_are_reported_as_drift() {
        let e = fitted(PoolClustering::default(), &two_groups());
        let test = log(&[("Z", "R1"), ("B", "R9")]);
        let a = e.assign(&test).unwrap();
        assert_eq!(a.labels, vec![PoolLabel::Pool(0), PoolLabel::Unknown]);
        assert!(a.drift.unseen_resources.contains("R9"));
        assert!(a.drift.unseen_activities.contains("Z"));
    }

    #[test]
    fn missing_resource_is_a_labeled_error() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bad: EventLog = vec![Event::new("c", "A", t).with_resource("R1"), Event::new("c", "B", t)]
            .into_iter()
            .collect();
        let mut e = ResourcePoolExtractor::new(ResourcePoolConfig::default()).unwrap();
        let err = e.fit(&bad).unwrap_err();
        assert!(matches!(err, FeatureError::MissingValue { ref column, row: 1 } if column == "org:resource"));
    }

    #[test]
    fn log_without_resources_is_a_missing_column() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bare: EventLog = vec![Event::new("c", "A", t), Event::new("c", "B", t)]
            .into_iter()
            .collect();
        let mut e = ResourcePoolExtractor::new(ResourcePoolConfig::default())
            .unwrap()
            .with_column("staff");
        let err = e.fit(&bare).unwrap_err();
        assert!(matches!(err, FeatureError::MissingColumn { column } if column == "staff"));

        e.fit(&two_groups()).unwrap();
        assert!(matches!(
            e.transform(&bare).unwrap_err(),
            FeatureError::MissingColumn { .. }
        ));
    }

    #[test]
    fn threshold_out_of_range_fails_at_construction() {
        let err = ResourcePoolExtractor::new(ResourcePoolConfig {
            clustering: PoolClustering::CorrelationThreshold { threshold: 1.5 },
            ..ResourcePoolConfig::default()
        })
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn kmeans_is_deterministic_for_a_seed() {
        let clustering = PoolClustering::KMeans {
            n_pools: 2,
            seed: 7,
            max_iterations: 50,
        };
        let train = two_groups();
        let a = fitted(clustering.clone(), &train);
        let b = fitted(clustering, &train);
        assert_eq!(a.n_pools(), Some(2));
        for r in ["R1", "R2", "R3", "R4"] {
            assert_eq!(a.pool_of(r), b.pool_of(r));
        }
        assert_eq!(a.pool_of("R1"), a.pool_of("R3"));
        assert_ne!(a.pool_of("R1"), a.pool_of("R2"));
    }

    #[test]
    fn densify_numbers_by_first_occurrence() {
        assert_eq!(densify(&[4, 4, 1, 9, 1]), (vec![0, 0, 1, 2, 1], 3));
    }
}
