//! Performance benchmarks for the per-event hot path.
//!
//! Every raw OS event passes through the deduplicator and, when accepted,
//! the filter/exclusion matchers on the source thread, so both must stay
//! cheap under event bursts.
//!
//! **Benchmarks Included:**
//! - `dedup_burst`: create followed by N change events for one path
//! - `dedup_distinct`: N creates for distinct paths
//! - `match_rules`: filter and exclusion matching for a single change
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                     # Run all benchmarks
//! cargo bench -- dedup_burst      # Burst suppression only
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use filewatcher::rules::{MatchConfig, MatchRules, PathMatcher};
use filewatcher::watcher::{Deduplicator, PathProbe, RawEvent, Trigger};

fn file_probe(secs: u64) -> PathProbe {
    PathProbe {
        is_dir: false,
        write_time: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
    }
}

/// Benchmark: one logical create followed by a burst of change events.
fn bench_dedup_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_burst");

    for count in &[10u64, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let create = RawEvent::new(Trigger::Create, "/data/incoming/report.csv");
            let change = RawEvent::new(Trigger::Change, "/data/incoming/report.csv");

            b.iter(|| {
                let mut dedup = Deduplicator::new();
                let mut accepted = usize::from(dedup.observe_with(&create, file_probe(1)).is_some());
                for i in 0..count {
                    if dedup.observe_with(&change, file_probe(i)).is_some() {
                        accepted += 1;
                    }
                }
                black_box(accepted)
            });
        });
    }

    group.finish();
}

/// Benchmark: distinct paths, every event accepted.
fn bench_dedup_distinct(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_distinct");

    for count in &[100usize, 1000] {
        let events: Vec<RawEvent> = (0..count)
            .map(|i| RawEvent::new(Trigger::Create, PathBuf::from(format!("/data/file_{i}.txt"))))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &events, |b, events| {
            b.iter(|| {
                let mut dedup = Deduplicator::new();
                for event in events {
                    black_box(dedup.observe_with(event, file_probe(1)));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark: filter and exclusion matching.
fn bench_match_rules(c: &mut Criterion) {
    let filters = MatchRules::new(&MatchConfig {
        files: vec!["*.csv".to_string(), "*.txt".to_string()],
        folders: vec!["incoming".to_string()],
        paths: Vec::new(),
    })
    .unwrap_or_else(|e| panic!("invalid filter patterns: {e}"));
    let exclusions = MatchRules::new(&MatchConfig {
        files: vec!["*.tmp".to_string(), "~*".to_string()],
        folders: vec![".git".to_string()],
        paths: vec!["/data/archive/**".to_string()],
    })
    .unwrap_or_else(|e| panic!("invalid exclusion patterns: {e}"));

    let directory = Path::new("/data/incoming/2024");
    let full_path = Path::new("/data/incoming/2024/report.csv");

    c.bench_function("match_rules", |b| {
        b.iter(|| {
            let kept = filters.matches(directory, "report.csv", full_path)
                && !exclusions.matches(directory, "report.csv", full_path);
            black_box(kept)
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_dedup_burst, bench_dedup_distinct, bench_match_rules
}

criterion_main!(benches);
