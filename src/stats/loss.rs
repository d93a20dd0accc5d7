//! Loss and reorder accounting

use crate::stream::ProbeOutcome;
use serde::Serialize;

/// Counts derived from one stream's outcomes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossReport {
    pub issued: usize,
    /// Replies that arrived in order
    pub delivered: usize,
    pub reordered: usize,
    pub lost: usize,
    /// `lost / issued`, between 0 and 1
    pub loss_rate: f64,
    pub reorder_count: usize,
}

impl LossReport {
    /// Probes that got any reply
    pub fn received(&self) -> usize {
        self.delivered + self.reordered
    }

    pub fn loss_percent(&self) -> f64 {
        self.loss_rate * 100.0
    }

    /// Reordered replies as a share of all replies
    pub fn reorder_percent(&self) -> f64 {
        if self.received() == 0 {
            0.0
        } else {
            self.reordered as f64 / self.received() as f64 * 100.0
        }
    }
}

/// Count the outcomes of a stream
pub fn classify(outcomes: &[ProbeOutcome]) -> LossReport {
    let mut delivered = 0;
    let mut reordered = 0;
    let mut lost = 0;

    for outcome in outcomes {
        match outcome {
            ProbeOutcome::Delivered { .. } => delivered += 1,
            ProbeOutcome::Reordered { .. } => reordered += 1,
            ProbeOutcome::Lost => lost += 1,
        }
    }

    let issued = outcomes.len();
    let loss_rate = if issued == 0 { 0.0 } else { lost as f64 / issued as f64 };

    LossReport {
        issued,
        delivered,
        reordered,
        lost,
        loss_rate,
        reorder_count: reordered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn delivered() -> ProbeOutcome {
        ProbeOutcome::Delivered { rtt: Duration::from_millis(5), arrival_order: 0 }
    }

    fn reordered() -> ProbeOutcome {
        ProbeOutcome::Reordered { rtt: Duration::from_millis(5), arrival_order: 0 }
    }

    #[test]
    fn test_counts_partition_the_stream() {
        let report = classify(&[delivered(), ProbeOutcome::Lost, reordered(), delivered()]);

        assert_eq!(report.issued, 4);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.reordered, 1);
        assert_eq!(report.lost, 1);
        assert_eq!(report.received(), 3);
        assert_eq!(report.loss_rate, 0.25);
        assert_eq!(report.reorder_count, 1);
        assert!((report.reorder_percent() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_loss() {
        let report = classify(&[ProbeOutcome::Lost; 5]);
        assert_eq!(report.loss_percent(), 100.0);
        assert_eq!(report.reorder_percent(), 0.0);
    }

    #[test]
    fn test_empty_stream() {
        let report = classify(&[]);
        assert_eq!(report.issued, 0);
        assert_eq!(report.loss_rate, 0.0);
    }
}
