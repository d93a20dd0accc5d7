//! Path MTU discovery by binary search over don't-fragment probe sizes

use crate::{
    defaults,
    error::{AppError, Result},
    probe::{ProbeStatus, ProbeTransport},
    types::Target,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Largest payload that crossed the path without fragmentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MtuOutcome {
    pub payload_bytes: usize,
    /// Payload plus ICMP and IP headers
    pub mtu_bytes: usize,
    /// Distinct sizes tried
    pub iterations: u32,
    /// Last next-hop MTU a router reported, if any
    pub reported_next_hop_mtu: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SizeVerdict {
    Passed,
    Failed { next_hop_mtu: Option<u32> },
}

pub struct MtuDiscovery {
    transport: Arc<dyn ProbeTransport>,
    attempts_per_size: u32,
}

impl MtuDiscovery {
    pub fn new(transport: Arc<dyn ProbeTransport>) -> Self {
        Self {
            transport,
            attempts_per_size: defaults::DEFAULT_MTU_ATTEMPTS_PER_SIZE,
        }
    }

    /// Probes per size before the size counts as failed; a
    /// fragmentation-needed reply fails it immediately
    pub fn with_attempts_per_size(mut self, attempts: u32) -> Self {
        self.attempts_per_size = attempts.max(1);
        self
    }

    /// Find the largest payload in `[min_size, max_size]` that reaches the
    /// target with don't-fragment set.
    ///
    /// Midpoint steps halve the interval, so a path that reports no next-hop
    /// MTU is searched in at most `iteration_bound(min_size, max_size)`
    /// sizes. Each reported next-hop MTU adds at most one extra size.
    pub async fn discover(
        &self,
        target: &Target,
        min_size: usize,
        max_size: usize,
        deadline_per_probe: Duration,
    ) -> Result<MtuOutcome> {
        if min_size > max_size {
            return Err(AppError::validation(format!(
                "MTU search range is empty: {} > {}",
                min_size, max_size
            )));
        }

        let overhead = target.header_overhead();
        let mut sequence: u16 = 0;
        let mut iterations = 0;
        let mut reported_next_hop_mtu = None;
        let mut hint = None;
        let mut low_confirmed = false;
        let (mut low, mut high) = (min_size, max_size);

        // Every size tried strictly shrinks [low, high]
        while low < high {
            // A size derived from a reported next-hop MTU is tried first
            let mid = hint
                .take()
                .filter(|size| *size > low && *size <= high)
                .unwrap_or(low + (high - low + 1) / 2);
            iterations += 1;

            match self.probe_size(target, mid, deadline_per_probe, &mut sequence).await? {
                SizeVerdict::Passed => {
                    low = mid;
                    low_confirmed = true;
                }
                SizeVerdict::Failed { next_hop_mtu } => {
                    high = mid - 1;
                    if let Some(mtu) = next_hop_mtu {
                        reported_next_hop_mtu = Some(mtu);
                        let limit = (mtu as usize).saturating_sub(overhead);
                        high = high.min(limit.max(low));
                        hint = Some(limit);
                    }
                }
            }
        }

        if !low_confirmed {
            iterations += 1;
            if let SizeVerdict::Failed { .. } = self.probe_size(target, low, deadline_per_probe, &mut sequence).await? {
                return Err(AppError::measurement("path MTU below minimum probed size"));
            }
        }

        Ok(MtuOutcome {
            payload_bytes: low,
            mtu_bytes: low + overhead,
            iterations,
            reported_next_hop_mtu,
        })
    }

    async fn probe_size(
        &self,
        target: &Target,
        payload_size: usize,
        deadline: Duration,
        sequence: &mut u16,
    ) -> Result<SizeVerdict> {
        for _ in 0..self.attempts_per_size {
            let reply = self
                .transport
                .send_and_wait(target, *sequence, payload_size, true, deadline)
                .await?;
            *sequence = sequence.wrapping_add(1);

            match reply.status {
                ProbeStatus::Received { .. } => return Ok(SizeVerdict::Passed),
                ProbeStatus::FragmentationNeeded { next_hop_mtu } => {
                    return Ok(SizeVerdict::Failed { next_hop_mtu })
                }
                ProbeStatus::TimedOut => continue,
            }
        }

        Ok(SizeVerdict::Failed { next_hop_mtu: None })
    }
}

/// Most sizes a search over `[min_size, max_size]` can try: the binary
/// search steps plus one confirmation probe of `min_size`
pub fn iteration_bound(min_size: usize, max_size: usize) -> u32 {
    let candidates = max_size.saturating_sub(min_size) + 1;
    let steps = usize::BITS - (candidates - 1).leading_zeros();
    steps + 1
}
