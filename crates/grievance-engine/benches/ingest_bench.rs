//! Ingest and query benchmarks.
//!
//! Single-report ingest into a populated engine, a batch of 500 through
//! normalize, schedule and place, and the dashboard read path.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use grievance_core::traits::FixedClock;
use grievance_core::{GrievanceConfig, RawReport};
use grievance_engine::GrievanceEngine;
use test_fixtures::{raw_report, ts};

const TOPICS: [&str; 6] = [
    "pension not credited",
    "ration shop closed",
    "midday meal skipped",
    "hand pump broken",
    "road washed away",
    "clinic without doctor",
];

fn batch(n: usize) -> Vec<RawReport> {
    (0..n)
        .map(|i| {
            let text = format!("{} in ward {} since {} days", TOPICS[i % TOPICS.len()], i % 17, i % 9);
            raw_report(&format!("r{i}"), &text, ts((i % 30) as i64))
        })
        .collect()
}

fn engine() -> GrievanceEngine {
    let config = GrievanceConfig::default();
    GrievanceEngine::with_parts(
        config.clone(),
        Arc::new(grievance_embeddings::HashingEmbedder::new(&config.embedding)),
        Arc::new(FixedClock::new(ts(30))),
    )
    .unwrap()
}

fn bench_ingest_single(c: &mut Criterion) {
    let engine = engine();
    engine.ingest_batch(batch(1_000));
    let mut next = 0usize;
    c.bench_function("ingest_single_into_1000", |b| {
        b.iter(|| {
            next += 1;
            let text = format!("{} near block {next}", TOPICS[next % TOPICS.len()]);
            engine.ingest(raw_report(&format!("s{next}"), &text, ts(29)))
        });
    });
}

fn bench_ingest_batch_500(c: &mut Criterion) {
    c.bench_function("ingest_batch_500", |b| {
        b.iter_batched(
            || (engine(), batch(500)),
            |(engine, reports)| engine.ingest_batch(reports),
            BatchSize::LargeInput,
        );
    });
}

fn bench_dashboard_reads(c: &mut Criterion) {
    let engine = engine();
    engine.ingest_batch(batch(2_000));
    engine.run_cycle();

    c.bench_function("list_hot_clusters_2000", |b| {
        b.iter(|| engine.query().list_hot_clusters(Some(20)));
    });
    c.bench_function("causal_graph_full_2000", |b| {
        b.iter(|| engine.query().causal_graph(None));
    });
}

criterion_group!(benches, bench_ingest_single, bench_ingest_batch_500, bench_dashboard_reads);
criterion_main!(benches);
