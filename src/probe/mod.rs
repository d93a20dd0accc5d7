//! Probe transport: send one echo request and wait for its fate
//!
//! The measurement code only talks to [`ProbeTransport`]; the raw ICMP socket
//! implementation lives in [`icmp`] and a deterministic stand-in for tests
//! and offline runs lives in [`simulated`].

pub mod icmp;
pub mod packet;
pub mod simulated;

use crate::{error::Result, types::Target};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

pub use icmp::IcmpTransport;
pub use simulated::SimulatedTransport;

/// What happened to a single probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeStatus {
    /// An echo reply came back
    Received { received_at: Instant, rtt: Duration },
    /// The path refused the datagram because it was too large with
    /// don't-fragment set
    FragmentationNeeded { next_hop_mtu: Option<u32> },
    /// Nothing arrived before the per-probe deadline
    TimedOut,
}

/// The fate of one probe, identified by its sequence number within a stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReply {
    pub sequence: u16,
    pub sent_at: Instant,
    pub status: ProbeStatus,
}

impl ProbeReply {
    pub fn rtt(&self) -> Option<Duration> {
        match self.status {
            ProbeStatus::Received { rtt, .. } => Some(rtt),
            _ => None,
        }
    }

    pub fn is_received(&self) -> bool {
        matches!(self.status, ProbeStatus::Received { .. })
    }
}

/// A channel able to send echo probes toward a target.
///
/// Implementations must be safe to call concurrently: a stream keeps several
/// probes in flight and each call resolves independently.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Send one echo request with `payload_size` payload bytes and wait up to
    /// `deadline` for the matching reply.
    ///
    /// Loss is not an error: a probe without reply yields
    /// [`ProbeStatus::TimedOut`]. Errors are reserved for a broken channel.
    async fn send_and_wait(
        &self,
        target: &Target,
        sequence: u16,
        payload_size: usize,
        dont_fragment: bool,
        deadline: Duration,
    ) -> Result<ProbeReply>;

    /// Total probes handed to the network so far
    fn probes_sent(&self) -> u64;

    /// Short human readable description for logs
    fn describe(&self) -> String {
        "probe transport".to_string()
    }
}
