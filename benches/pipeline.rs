//! Pipeline benchmark: synthetic event log → timestamp, resource pool and per-case features.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pm_features::config::{PipelineConfig, ResourcePoolConfig, TimestampConfig};
use pm_features::features::{CaseFeaturePipeline, ResourcePoolExtractor, TimestampExtractor, Transformer};
use pm_features::{Event, EventLog};

fn make_dummy_log(cases: usize, events_per_case: usize) -> EventLog {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    (0..cases * events_per_case)
        .map(|i| {
            let case = i % cases;
            let step = i / cases;
            Event::new(
                format!("case_{}", case),
                format!("act_{}", step % 7),
                start + Duration::minutes((case * 13 + step * 29) as i64),
            )
            .with_resource(format!("res_{}", (case + step) % 20))
        })
        .collect()
}

fn bench_timestamp_features(c: &mut Criterion) {
    let log = make_dummy_log(200, 10);
    let mut extractor = TimestampExtractor::new(TimestampConfig::default()).unwrap();
    extractor.fit(&log).unwrap();

    c.bench_function("timestamp_features_2000_events", |b| {
        b.iter(|| black_box(extractor.transform(black_box(&log)).unwrap()))
    });
}

fn bench_resource_pools(c: &mut Criterion) {
    let log = make_dummy_log(200, 10);

    c.bench_function("resource_pool_fit_2000_events", |b| {
        b.iter(|| {
            let mut extractor = ResourcePoolExtractor::new(ResourcePoolConfig::default()).unwrap();
            extractor.fit(black_box(&log)).unwrap();
            black_box(extractor.n_pools())
        })
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let log = make_dummy_log(200, 10);
    let config = PipelineConfig::default();

    c.bench_function("full_pipeline_fit_transform", |b| {
        b.iter(|| {
            let mut pipeline = CaseFeaturePipeline::new(&config).unwrap();
            black_box(pipeline.fit_transform(black_box(&log)).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_timestamp_features,
    bench_resource_pools,
    bench_full_pipeline
);
criterion_main!(benches);
