//! Sequenced probe streams and arrival-order classification

use crate::{
    defaults,
    error::{AppError, Result},
    probe::{ProbeStatus, ProbeTransport},
    types::Target,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Final classification of one probe of a stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    /// Replied, and no later probe overtook it
    Delivered { rtt: Duration, arrival_order: usize },
    /// Replied after a probe with a higher sequence number
    Reordered { rtt: Duration, arrival_order: usize },
    Lost,
}

impl ProbeOutcome {
    pub fn rtt(&self) -> Option<Duration> {
        match self {
            ProbeOutcome::Delivered { rtt, .. } | ProbeOutcome::Reordered { rtt, .. } => Some(*rtt),
            ProbeOutcome::Lost => None,
        }
    }

    pub fn arrival_order(&self) -> Option<usize> {
        match self {
            ProbeOutcome::Delivered { arrival_order, .. } | ProbeOutcome::Reordered { arrival_order, .. } => {
                Some(*arrival_order)
            }
            ProbeOutcome::Lost => None,
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, ProbeOutcome::Lost)
    }

    pub fn is_reordered(&self) -> bool {
        matches!(self, ProbeOutcome::Reordered { .. })
    }
}

/// A received reply, as seen by the stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrival {
    pub received_at: Instant,
    /// Position among completed probe tasks, breaks timestamp ties
    pub completion: usize,
    pub rtt: Duration,
}

/// Issues numbered probes at a fixed cadence and classifies their fate
pub struct ProbeStream {
    transport: Arc<dyn ProbeTransport>,
    payload_size: usize,
}

impl ProbeStream {
    pub fn new(transport: Arc<dyn ProbeTransport>) -> Self {
        Self {
            transport,
            payload_size: defaults::DEFAULT_PAYLOAD_SIZE,
        }
    }

    pub fn with_payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    /// Send `count` probes, one every `interval`, and return one outcome per
    /// sequence number in sequence order.
    ///
    /// Probes are independent tasks, so a slow reply never delays later
    /// sends. Completes within `count × interval + per_probe_timeout`.
    /// Dropping the returned future aborts every probe still in flight.
    pub async fn run(
        &self,
        target: &Target,
        count: u32,
        interval: Duration,
        per_probe_timeout: Duration,
    ) -> Result<Vec<ProbeOutcome>> {
        if count == 0 {
            return Err(AppError::validation("a probe stream needs at least one probe"));
        }
        if interval.is_zero() {
            return Err(AppError::validation("probe interval must be greater than zero"));
        }
        let count = u16::try_from(count)
            .map_err(|_| AppError::validation(format!("at most {} probes fit in one stream", u16::MAX)))?;

        let completions = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        let mut ticker = tokio::time::interval(interval);

        for sequence in 0..count {
            ticker.tick().await;

            let transport = self.transport.clone();
            let target = target.clone();
            let completions = completions.clone();
            let payload_size = self.payload_size;

            tasks.spawn(async move {
                let reply = transport
                    .send_and_wait(&target, sequence, payload_size, false, per_probe_timeout)
                    .await?;
                let completion = completions.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>((reply, completion))
            });
        }

        let mut arrivals = vec![None; usize::from(count)];
        while let Some(joined) = tasks.join_next().await {
            let (reply, completion) = joined??;
            if let ProbeStatus::Received { received_at, rtt } = reply.status {
                if let Some(slot) = arrivals.get_mut(usize::from(reply.sequence)) {
                    *slot = Some(Arrival { received_at, completion, rtt });
                }
            }
        }

        Ok(classify_arrivals(&arrivals))
    }
}

/// Turn per-sequence arrivals into outcomes.
///
/// Arrivals are ranked by receive time, ties broken by completion order.
/// Probe `k` is reordered when some probe with a higher sequence number
/// ranks before it. `None` means no reply and yields `Lost`.
pub fn classify_arrivals(arrivals: &[Option<Arrival>]) -> Vec<ProbeOutcome> {
    let mut received: Vec<(usize, Arrival)> = arrivals
        .iter()
        .enumerate()
        .filter_map(|(sequence, arrival)| arrival.map(|arrival| (sequence, arrival)))
        .collect();
    received.sort_by_key(|(_, arrival)| (arrival.received_at, arrival.completion));

    let mut rank = vec![None; arrivals.len()];
    for (order, (sequence, _)) in received.iter().enumerate() {
        rank[*sequence] = Some(order);
    }

    let mut outcomes = vec![ProbeOutcome::Lost; arrivals.len()];
    let mut earliest_later_rank = usize::MAX;

    for sequence in (0..arrivals.len()).rev() {
        if let (Some(arrival), Some(arrival_order)) = (arrivals[sequence], rank[sequence]) {
            outcomes[sequence] = if earliest_later_rank < arrival_order {
                ProbeOutcome::Reordered { rtt: arrival.rtt, arrival_order }
            } else {
                ProbeOutcome::Delivered { rtt: arrival.rtt, arrival_order }
            };
            earliest_later_rank = earliest_later_rank.min(arrival_order);
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeReply, SimulatedTransport};
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};

    fn target() -> Target {
        Target::from_ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)))
    }

    fn arrival(at_ms: u64, completion: usize, rtt_ms: u64, base: Instant) -> Option<Arrival> {
        Some(Arrival {
            received_at: base + Duration::from_millis(at_ms),
            completion,
            rtt: Duration::from_millis(rtt_ms),
        })
    }

    #[test]
    fn test_classify_in_order() {
        let base = Instant::now();
        let arrivals = vec![arrival(10, 0, 10, base), arrival(20, 1, 10, base), arrival(30, 2, 10, base)];
        let outcomes = classify_arrivals(&arrivals);

        assert!(outcomes.iter().all(|o| matches!(o, ProbeOutcome::Delivered { .. })));
        assert_eq!(outcomes[2].arrival_order(), Some(2));
    }

    #[test]
    fn test_classify_late_reply_is_reordered() {
        let base = Instant::now();
        // Sequence 1 arrives after 2 and 3
        let arrivals = vec![
            arrival(10, 0, 10, base),
            arrival(50, 3, 40, base),
            arrival(30, 1, 10, base),
            arrival(40, 2, 10, base),
        ];
        let outcomes = classify_arrivals(&arrivals);

        assert!(!outcomes[0].is_reordered());
        assert!(outcomes[1].is_reordered());
        assert!(!outcomes[2].is_reordered());
        assert!(!outcomes[3].is_reordered());
        assert_eq!(outcomes[1].arrival_order(), Some(3));
    }

    #[test]
    fn test_classify_ties_use_completion_order() {
        let base = Instant::now();
        let arrivals = vec![arrival(10, 1, 10, base), arrival(10, 0, 5, base)];
        let outcomes = classify_arrivals(&arrivals);

        assert!(outcomes[0].is_reordered());
        assert!(!outcomes[1].is_reordered());
    }

    #[test]
    fn test_classify_losses() {
        let base = Instant::now();
        let outcomes = classify_arrivals(&[None, arrival(10, 0, 10, base), None]);
        assert_eq!(outcomes[0], ProbeOutcome::Lost);
        assert!(!outcomes[1].is_lost());
        assert_eq!(outcomes[2], ProbeOutcome::Lost);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_outcome_per_sequence() {
        let transport = Arc::new(SimulatedTransport::new(Duration::from_millis(15)));
        let stream = ProbeStream::new(transport.clone());

        let outcomes = stream
            .run(&target(), 5, Duration::from_millis(100), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.rtt() == Some(Duration::from_millis(15))));
        assert_eq!(transport.probes_sent(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_detects_overtaking() {
        let transport = Arc::new(SimulatedTransport::new(Duration::from_millis(10)).with_rtts_ms(&[Some(100), Some(20), Some(20)]));
        let stream = ProbeStream::new(transport);

        let outcomes = stream
            .run(&target(), 3, Duration::from_millis(10), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(outcomes[0].is_reordered());
        assert!(!outcomes[1].is_reordered());
        assert!(!outcomes[2].is_reordered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_wall_time_bound_with_total_loss() {
        let stream = ProbeStream::new(Arc::new(SimulatedTransport::unreachable()));
        let start = Instant::now();

        let outcomes = stream
            .run(&target(), 10, Duration::from_millis(100), Duration::from_millis(500))
            .await
            .unwrap();

        assert!(outcomes.iter().all(ProbeOutcome::is_lost));
        assert!(start.elapsed() <= Duration::from_millis(10 * 100 + 500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_rejects_empty_and_zero_interval() {
        let stream = ProbeStream::new(Arc::new(SimulatedTransport::new(Duration::from_millis(1))));
        assert!(stream.run(&target(), 0, Duration::from_millis(10), Duration::from_secs(1)).await.is_err());
        assert!(stream.run(&target(), 3, Duration::ZERO, Duration::from_secs(1)).await.is_err());
    }

    struct BrokenTransport;

    #[async_trait]
    impl ProbeTransport for BrokenTransport {
        async fn send_and_wait(
            &self,
            _target: &Target,
            sequence: u16,
            _payload_size: usize,
            _dont_fragment: bool,
            _deadline: Duration,
        ) -> Result<ProbeReply> {
            if sequence == 1 {
                Err(AppError::transport("socket closed"))
            } else {
                Ok(ProbeReply { sequence, sent_at: Instant::now(), status: ProbeStatus::TimedOut })
            }
        }

        fn probes_sent(&self) -> u64 {
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_aborts_stream() {
        let stream = ProbeStream::new(Arc::new(BrokenTransport));
        let err = stream
            .run(&target(), 3, Duration::from_millis(10), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "TRANSPORT");
    }
}
