//! Latency and jitter aggregation over probe outcomes

pub mod loss;

pub use loss::{classify, LossReport};

use crate::{
    error::{AppError, Result},
    stream::ProbeOutcome,
};
use serde::Serialize;
use std::time::Duration;

/// Round trip time statistics of one stream, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    /// Population standard deviation
    pub stddev_ms: f64,
    pub median_ms: f64,
    /// `None` with fewer than two samples
    pub jitter: Option<JitterSummary>,
}

/// Variation between consecutive round trip times, in send order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JitterSummary {
    /// Mean absolute difference between consecutive samples
    pub jitter_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl LatencySummary {
    /// Jitter figures, failing when there were too few samples for any
    pub fn require_jitter(&self) -> Result<&JitterSummary> {
        self.jitter
            .as_ref()
            .ok_or_else(|| AppError::statistics("insufficient samples for jitter calculation"))
    }
}

/// Summarize the round trip times of delivered and reordered probes.
///
/// Lost probes are ignored. A stream without a single reply is an error, not
/// a zero latency.
pub fn summarize(outcomes: &[ProbeOutcome]) -> Result<LatencySummary> {
    let rtts: Vec<f64> = outcomes.iter().filter_map(ProbeOutcome::rtt).map(duration_ms).collect();

    if rtts.is_empty() {
        return Err(AppError::statistics("no successful probes"));
    }

    let mean = rtts.iter().sum::<f64>() / rtts.len() as f64;
    let mut sorted = rtts.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Ok(LatencySummary {
        samples: rtts.len(),
        min_ms: sorted[0],
        max_ms: sorted[sorted.len() - 1],
        mean_ms: mean,
        stddev_ms: population_std_dev(&rtts, mean),
        median_ms: calculate_percentile(&sorted, 50.0),
        jitter: jitter(&rtts),
    })
}

/// Linear interpolation percentile over already sorted values
pub fn calculate_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn jitter(rtts: &[f64]) -> Option<JitterSummary> {
    let deltas: Vec<f64> = rtts.windows(2).map(|pair| (pair[1] - pair[0]).abs()).collect();
    if deltas.is_empty() {
        return None;
    }

    Some(JitterSummary {
        jitter_ms: deltas.iter().sum::<f64>() / deltas.len() as f64,
        min_ms: deltas.iter().copied().fold(f64::INFINITY, f64::min),
        max_ms: deltas.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivered(ms: u64) -> ProbeOutcome {
        ProbeOutcome::Delivered {
            rtt: Duration::from_millis(ms),
            arrival_order: 0,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
    }

    #[test]
    fn test_summary_of_three_samples() {
        let summary = summarize(&[delivered(10), delivered(20), delivered(30)]).unwrap();

        assert_eq!(summary.samples, 3);
        assert_close(summary.min_ms, 10.0);
        assert_close(summary.max_ms, 30.0);
        assert_close(summary.mean_ms, 20.0);
        assert_close(summary.median_ms, 20.0);
        assert_close(summary.stddev_ms, (200.0f64 / 3.0).sqrt());

        let jitter = summary.jitter.unwrap();
        assert_close(jitter.jitter_ms, 10.0);
        assert_close(jitter.min_ms, 10.0);
        assert_close(jitter.max_ms, 10.0);
    }

    #[test]
    fn test_lost_probes_are_skipped() {
        let outcomes = [delivered(10), ProbeOutcome::Lost, delivered(30)];
        let summary = summarize(&outcomes).unwrap();

        assert_eq!(summary.samples, 2);
        assert_close(summary.jitter.unwrap().jitter_ms, 20.0);
    }

    #[test]
    fn test_reordered_probes_count_as_samples() {
        let outcomes = [
            ProbeOutcome::Reordered { rtt: Duration::from_millis(40), arrival_order: 1 },
            delivered(10),
        ];
        let summary = summarize(&outcomes).unwrap();
        assert_eq!(summary.samples, 2);
        assert_close(summary.max_ms, 40.0);
    }

    #[test]
    fn test_jitter_uses_send_order() {
        let summary = summarize(&[delivered(10), delivered(30), delivered(10), delivered(30)]).unwrap();
        assert_close(summary.jitter.unwrap().jitter_ms, 20.0);
    }

    #[test]
    fn test_no_samples_is_an_error() {
        let err = summarize(&[ProbeOutcome::Lost, ProbeOutcome::Lost]).unwrap_err();
        assert_eq!(err.category(), "STATS");
        assert!(err.to_string().contains("no successful probes"));

        assert!(summarize(&[]).is_err());
    }

    #[test]
    fn test_single_sample_has_no_jitter() {
        let summary = summarize(&[delivered(12)]).unwrap();
        assert!(summary.jitter.is_none());
        assert_close(summary.stddev_ms, 0.0);

        let err = summary.require_jitter().unwrap_err();
        assert!(err.to_string().contains("insufficient samples for jitter calculation"));
    }

    #[test]
    fn test_percentile_calculation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];

        assert_eq!(calculate_percentile(&values, 50.0), 5.5);
        assert_close(calculate_percentile(&values, 90.0), 9.1);
        assert_eq!(calculate_percentile(&values, 100.0), 10.0);
        assert_eq!(calculate_percentile(&[], 50.0), 0.0);
    }
}
