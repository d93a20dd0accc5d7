//! Performance benchmarks for the path quality tester
//!
//! Covers the per-run hot paths that do not touch the network: outcome
//! classification, statistics and report serialization.

use chrono::Utc;
use clap::Parser;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use path_quality_tester::{
    cli::Cli,
    config::parser::ConfigParser,
    models::{MetricResult, MetricValues, RunReport},
    probe::packet,
    stats,
    stream::{classify_arrivals, Arrival, ProbeOutcome},
    types::{MetricKind, Target},
};
use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::time::Instant;

/// Arrivals with every tenth probe lost and every seventh overtaken
fn create_sample_arrivals(count: usize) -> Vec<Option<Arrival>> {
    let start = Instant::now();
    (0..count)
        .map(|i| {
            if i % 10 == 9 {
                return None;
            }
            let rtt = if i % 7 == 0 {
                Duration::from_millis(40)
            } else {
                Duration::from_millis(5 + i as u64 % 3)
            };
            Some(Arrival {
                received_at: start + Duration::from_millis(10 * i as u64) + rtt,
                completion: i,
                rtt,
            })
        })
        .collect()
}

fn create_sample_outcomes(count: usize) -> Vec<ProbeOutcome> {
    classify_arrivals(&create_sample_arrivals(count))
}

fn benchmark_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");

    for count in [10, 100, 1000] {
        let arrivals = create_sample_arrivals(count);
        group.bench_with_input(BenchmarkId::new("classify_arrivals", count), &arrivals, |b, arrivals| {
            b.iter(|| black_box(classify_arrivals(black_box(arrivals))));
        });

        let outcomes = create_sample_outcomes(count);
        group.bench_with_input(BenchmarkId::new("loss_report", count), &outcomes, |b, outcomes| {
            b.iter(|| black_box(stats::classify(black_box(outcomes))));
        });
    }

    group.finish();
}

fn benchmark_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for count in [10, 100, 1000] {
        let outcomes = create_sample_outcomes(count);
        group.bench_with_input(BenchmarkId::new("summarize", count), &outcomes, |b, outcomes| {
            b.iter(|| black_box(stats::summarize(black_box(outcomes))));
        });
    }

    group.bench_function("percentile_95", |b| {
        let sorted: Vec<f64> = (0..1000).map(|i| i as f64 * 0.1).collect();
        b.iter(|| black_box(stats::calculate_percentile(black_box(&sorted), 95.0)));
    });

    group.finish();
}

fn benchmark_packets(c: &mut Criterion) {
    let mut group = c.benchmark_group("packets");

    for size in [56, 1472] {
        group.bench_with_input(BenchmarkId::new("echo_request_v4", size), &size, |b, &size| {
            b.iter(|| black_box(packet::echo_request(false, 0x1234, black_box(7), size)));
        });
    }

    group.finish();
}

fn benchmark_report(c: &mut Criterion) {
    let metrics = vec![
        MetricResult::success(
            MetricKind::Latency,
            MetricValues::Latency { min_ms: 4.1, max_ms: 19.7, mean_ms: 8.3, stddev_ms: 2.2, median_ms: 7.9 },
            10,
            1,
            Duration::from_secs(1),
        ),
        MetricResult::success(
            MetricKind::Bandwidth,
            MetricValues::Bandwidth { download_mbps: Some(412.5), upload_mbps: None },
            1,
            1,
            Duration::from_secs(8),
        ),
    ];
    let report = RunReport::new(
        "bench".to_string(),
        Target::from_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
        10,
        Utc::now(),
        metrics,
    );

    c.bench_function("report_to_json", |b| {
        b.iter(|| black_box(serde_json::to_string_pretty(black_box(&report))));
    });

    c.bench_function("config_parsing", |b| {
        b.iter(|| {
            let cli = Cli::parse_from(["pqt", "-t", "192.0.2.1", "-s", "50", "-m", "latency,jitter"]);
            black_box(ConfigParser::new(cli).parse())
        });
    });
}

criterion_group!(
    benches,
    benchmark_classification,
    benchmark_statistics,
    benchmark_packets,
    benchmark_report
);

criterion_main!(benches);
