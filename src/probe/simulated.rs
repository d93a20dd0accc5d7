//! Deterministic in-process probe transport
//!
//! Replies are scheduled with `tokio::time`, so under a paused test clock a
//! whole stream completes instantly and in a reproducible order.

use super::{ProbeReply, ProbeStatus, ProbeTransport};
use crate::{error::Result, types::Target};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Simulated network path with configurable delay, loss and MTU
#[derive(Debug)]
pub struct SimulatedTransport {
    base_rtt: Duration,
    /// Per-sequence round trip times; `None` drops that probe
    rtts: Vec<Option<Duration>>,
    /// Largest payload that passes with don't-fragment set
    mtu_limit: Option<usize>,
    signal_fragmentation: bool,
    /// A later hop that silently drops larger don't-fragment probes
    black_hole_above: Option<usize>,
    unreachable: bool,
    sent: AtomicU64,
}

impl SimulatedTransport {
    pub fn new(base_rtt: Duration) -> Self {
        Self {
            base_rtt,
            rtts: Vec::new(),
            mtu_limit: None,
            signal_fragmentation: false,
            black_hole_above: None,
            unreachable: false,
            sent: AtomicU64::new(0),
        }
    }

    /// A path where every probe is lost
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new(Duration::ZERO)
        }
    }

    /// Round trip time per sequence number. Sequences past the end of the
    /// list use the base round trip time.
    pub fn with_rtts(mut self, rtts: Vec<Option<Duration>>) -> Self {
        self.rtts = rtts;
        self
    }

    /// Convenience for round trip times given in milliseconds
    pub fn with_rtts_ms(self, rtts: &[Option<u64>]) -> Self {
        self.with_rtts(rtts.iter().map(|rtt| rtt.map(Duration::from_millis)).collect())
    }

    /// Drop don't-fragment probes whose payload exceeds `payload_limit`
    pub fn with_mtu_limit(mut self, payload_limit: usize) -> Self {
        self.mtu_limit = Some(payload_limit);
        self
    }

    /// Answer oversized probes with a fragmentation-needed message instead
    /// of silently dropping them
    pub fn with_fragmentation_signal(mut self) -> Self {
        self.signal_fragmentation = true;
        self
    }

    /// Silently drop don't-fragment probes whose payload exceeds
    /// `payload_limit`, even when an earlier hop signals a larger MTU
    pub fn with_black_hole_above(mut self, payload_limit: usize) -> Self {
        self.black_hole_above = Some(payload_limit);
        self
    }

    fn rtt_for(&self, sequence: u16) -> Option<Duration> {
        match self.rtts.get(usize::from(sequence)) {
            Some(rtt) => *rtt,
            None => Some(self.base_rtt),
        }
    }
}

#[async_trait]
impl ProbeTransport for SimulatedTransport {
    async fn send_and_wait(
        &self,
        target: &Target,
        sequence: u16,
        payload_size: usize,
        dont_fragment: bool,
        deadline: Duration,
    ) -> Result<ProbeReply> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let sent_at = Instant::now();

        let oversized = dont_fragment && self.mtu_limit.is_some_and(|limit| payload_size > limit);
        if oversized && self.signal_fragmentation {
            let next_hop_mtu = self
                .mtu_limit
                .map(|limit| (limit + target.header_overhead()) as u32);
            sleep(self.base_rtt.min(deadline)).await;
            return Ok(ProbeReply {
                sequence,
                sent_at,
                status: ProbeStatus::FragmentationNeeded { next_hop_mtu },
            });
        }

        let swallowed = dont_fragment && self.black_hole_above.is_some_and(|limit| payload_size > limit);
        let rtt = if self.unreachable || oversized || swallowed {
            None
        } else {
            self.rtt_for(sequence).filter(|rtt| *rtt <= deadline)
        };

        let status = match rtt {
            Some(rtt) => {
                sleep(rtt).await;
                ProbeStatus::Received {
                    received_at: Instant::now(),
                    rtt,
                }
            }
            None => {
                sleep(deadline).await;
                ProbeStatus::TimedOut
            }
        };

        Ok(ProbeReply { sequence, sent_at, status })
    }

    fn probes_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn describe(&self) -> String {
        "simulated path".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn target() -> Target {
        Target::from_ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_configured_rtt() {
        let transport = SimulatedTransport::new(Duration::from_millis(20));
        let reply = transport
            .send_and_wait(&target(), 0, 56, false, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(reply.rtt(), Some(Duration::from_millis(20)));
        assert_eq!(transport.probes_sent(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_sequence_loss() {
        let transport = SimulatedTransport::new(Duration::from_millis(5)).with_rtts_ms(&[Some(10), None]);

        let first = transport.send_and_wait(&target(), 0, 56, false, Duration::from_secs(1)).await.unwrap();
        let second = transport.send_and_wait(&target(), 1, 56, false, Duration::from_secs(1)).await.unwrap();
        let third = transport.send_and_wait(&target(), 2, 56, false, Duration::from_secs(1)).await.unwrap();

        assert_eq!(first.rtt(), Some(Duration::from_millis(10)));
        assert_eq!(second.status, ProbeStatus::TimedOut);
        assert_eq!(third.rtt(), Some(Duration::from_millis(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reply_past_deadline_is_lost() {
        let transport = SimulatedTransport::new(Duration::from_millis(500));
        let start = Instant::now();
        let reply = transport
            .send_and_wait(&target(), 0, 56, false, Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(reply.status, ProbeStatus::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mtu_limit_only_applies_with_dont_fragment() {
        let transport = SimulatedTransport::new(Duration::from_millis(1)).with_mtu_limit(1400);

        let fragmented = transport.send_and_wait(&target(), 0, 1472, false, Duration::from_secs(1)).await.unwrap();
        let blocked = transport.send_and_wait(&target(), 1, 1472, true, Duration::from_secs(1)).await.unwrap();
        let fits = transport.send_and_wait(&target(), 2, 1400, true, Duration::from_secs(1)).await.unwrap();

        assert!(fragmented.is_received());
        assert_eq!(blocked.status, ProbeStatus::TimedOut);
        assert!(fits.is_received());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragmentation_signal_reports_next_hop_mtu() {
        let transport = SimulatedTransport::new(Duration::from_millis(1))
            .with_mtu_limit(1400)
            .with_fragmentation_signal();

        let reply = transport.send_and_wait(&target(), 0, 1472, true, Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.status, ProbeStatus::FragmentationNeeded { next_hop_mtu: Some(1428) });
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_loses_everything() {
        let transport = SimulatedTransport::unreachable();
        let reply = transport.send_and_wait(&target(), 0, 56, false, Duration::from_millis(50)).await.unwrap();
        assert_eq!(reply.status, ProbeStatus::TimedOut);
    }
}
