//! Metric result records and the run report

use crate::types::{MetricKind, MetricStatus, Target};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Computed values of one metric, shaped per metric kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValues {
    Latency {
        min_ms: f64,
        max_ms: f64,
        mean_ms: f64,
        stddev_ms: f64,
        median_ms: f64,
    },
    PacketLoss {
        loss_rate_percent: f64,
        packets_sent: usize,
        packets_received: usize,
    },
    PacketReordering {
        reorder_count: usize,
        reorder_rate_percent: f64,
    },
    Jitter {
        jitter_ms: f64,
        min_ms: f64,
        max_ms: f64,
    },
    Mtu {
        mtu_bytes: usize,
        payload_bytes: usize,
        iterations: u32,
    },
    DnsResolution {
        time_ms: f64,
        min_ms: f64,
        max_ms: f64,
        domains: usize,
    },
    Bandwidth {
        download_mbps: Option<f64>,
        upload_mbps: Option<f64>,
    },
}

impl MetricValues {
    /// Name/value pairs for console display, in report field order
    pub fn display_fields(&self) -> Vec<(&'static str, String)> {
        fn ms(value: f64) -> String {
            format!("{:.2}", value)
        }
        fn optional_mbps(value: Option<f64>) -> String {
            value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "n/a".to_string())
        }

        match self {
            MetricValues::Latency { min_ms, max_ms, mean_ms, stddev_ms, median_ms } => vec![
                ("min_ms", ms(*min_ms)),
                ("max_ms", ms(*max_ms)),
                ("mean_ms", ms(*mean_ms)),
                ("stddev_ms", ms(*stddev_ms)),
                ("median_ms", ms(*median_ms)),
            ],
            MetricValues::PacketLoss { loss_rate_percent, packets_sent, packets_received } => vec![
                ("loss_rate_percent", format!("{:.1}", loss_rate_percent)),
                ("packets_sent", packets_sent.to_string()),
                ("packets_received", packets_received.to_string()),
            ],
            MetricValues::PacketReordering { reorder_count, reorder_rate_percent } => vec![
                ("reorder_count", reorder_count.to_string()),
                ("reorder_rate_percent", format!("{:.1}", reorder_rate_percent)),
            ],
            MetricValues::Jitter { jitter_ms, min_ms, max_ms } => vec![
                ("jitter_ms", ms(*jitter_ms)),
                ("min_ms", ms(*min_ms)),
                ("max_ms", ms(*max_ms)),
            ],
            MetricValues::Mtu { mtu_bytes, payload_bytes, iterations } => vec![
                ("mtu_bytes", mtu_bytes.to_string()),
                ("payload_bytes", payload_bytes.to_string()),
                ("iterations", iterations.to_string()),
            ],
            MetricValues::DnsResolution { time_ms, min_ms, max_ms, domains } => vec![
                ("time_ms", ms(*time_ms)),
                ("min_ms", ms(*min_ms)),
                ("max_ms", ms(*max_ms)),
                ("domains", domains.to_string()),
            ],
            MetricValues::Bandwidth { download_mbps, upload_mbps } => vec![
                ("download_mbps", optional_mbps(*download_mbps)),
                ("upload_mbps", optional_mbps(*upload_mbps)),
            ],
        }
    }

    /// The value used to judge latency quality, when there is one
    pub fn headline_latency_ms(&self) -> Option<f64> {
        match self {
            MetricValues::Latency { mean_ms, .. } => Some(*mean_ms),
            MetricValues::DnsResolution { time_ms, .. } => Some(*time_ms),
            _ => None,
        }
    }
}

/// Uniform record of one metric of one run
#[derive(Debug, Clone, Serialize)]
pub struct MetricResult {
    #[serde(rename = "name")]
    pub metric: MetricKind,
    pub unit: &'static str,
    pub status: MetricStatus,
    /// `None` when the metric could not be computed
    pub values: Option<MetricValues>,
    pub failure: Option<String>,
    /// Number of samples the values were computed from
    pub samples: usize,
    pub attempts: u32,
    pub duration_ms: f64,
}

impl MetricResult {
    pub fn success(metric: MetricKind, values: MetricValues, samples: usize, attempts: u32, elapsed: Duration) -> Self {
        Self {
            metric,
            unit: metric.unit(),
            status: MetricStatus::Success,
            values: Some(values),
            failure: None,
            samples,
            attempts,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    pub fn failed(metric: MetricKind, reason: String, samples: usize, attempts: u32, elapsed: Duration) -> Self {
        Self {
            metric,
            unit: metric.unit(),
            status: MetricStatus::Failed,
            values: None,
            failure: Some(reason),
            samples,
            attempts,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    /// Record for a metric abandoned at its deadline
    pub fn timed_out(metric: MetricKind, budget: Duration, attempts: u32, elapsed: Duration) -> Self {
        Self {
            status: MetricStatus::TimedOut,
            ..Self::failed(
                metric,
                format!("metric exceeded its {}s time budget", budget.as_secs_f64()),
                0,
                attempts,
                elapsed,
            )
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MetricStatus::Success
    }
}

/// Ordered metric results of one run, keyed by metric name
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub tool: &'static str,
    pub version: &'static str,
    pub session_id: String,
    pub target: Target,
    pub sample_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_in_order")]
    pub metrics: Vec<MetricResult>,
}

impl RunReport {
    pub fn new(
        session_id: String,
        target: Target,
        sample_count: u32,
        started_at: DateTime<Utc>,
        metrics: Vec<MetricResult>,
    ) -> Self {
        Self {
            tool: crate::PKG_NAME,
            version: crate::VERSION,
            session_id,
            target,
            sample_count,
            started_at,
            completed_at: Utc::now(),
            metrics,
        }
    }

    pub fn get(&self, metric: MetricKind) -> Option<&MetricResult> {
        self.metrics.iter().find(|result| result.metric == metric)
    }

    /// Metric names in report order
    pub fn metric_names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|result| result.metric.name()).collect()
    }

    pub fn successful_count(&self) -> usize {
        self.metrics.iter().filter(|result| result.is_success()).count()
    }

    pub fn all_failed(&self) -> bool {
        self.successful_count() == 0
    }
}

/// Serialize the results as a JSON object whose key order is the run order
fn serialize_in_order<S: Serializer>(
    metrics: &[MetricResult],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(metrics.iter().map(|result| (result.metric.name(), result)))
}
