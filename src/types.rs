//! Type definitions shared across the measurement pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// The closed set of metrics a run can measure.
///
/// Declaration order is the canonical execution and report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Latency,
    PacketLoss,
    PacketReordering,
    Jitter,
    Mtu,
    #[serde(rename = "dns_resolution_time")]
    DnsResolution,
    Bandwidth,
}

impl MetricKind {
    /// Every metric, in canonical order
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Latency,
        MetricKind::PacketLoss,
        MetricKind::PacketReordering,
        MetricKind::Jitter,
        MetricKind::Mtu,
        MetricKind::DnsResolution,
        MetricKind::Bandwidth,
    ];

    /// Canonical name used on the command line and in reports
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Latency => "latency",
            MetricKind::PacketLoss => "packet_loss",
            MetricKind::PacketReordering => "packet_reordering",
            MetricKind::Jitter => "jitter",
            MetricKind::Mtu => "mtu",
            MetricKind::DnsResolution => "dns_resolution_time",
            MetricKind::Bandwidth => "bandwidth",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Latency | MetricKind::Jitter | MetricKind::DnsResolution => "ms",
            MetricKind::PacketLoss => "percent",
            MetricKind::PacketReordering => "count",
            MetricKind::Mtu => "bytes",
            MetricKind::Bandwidth => "Mbps",
        }
    }

    /// Whether this metric sends ICMP probes and needs the probe channel
    pub fn uses_probe_channel(&self) -> bool {
        !matches!(self, MetricKind::DnsResolution | MetricKind::Bandwidth)
    }

    /// Parse a list of metric names into a deduplicated set in canonical order.
    ///
    /// An empty list selects every metric. The first unknown name is reported
    /// together with the accepted names.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<MetricKind>> {
        if names.is_empty() {
            return Ok(Self::ALL.to_vec());
        }

        let mut kinds = names
            .iter()
            .map(|name| name.as_ref().parse::<MetricKind>())
            .collect::<Result<Vec<_>>>()?;
        kinds.sort();
        kinds.dedup();
        Ok(kinds)
    }

    /// Comma separated list of the canonical names
    pub fn valid_names() -> String {
        Self::ALL.iter().map(|kind| kind.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "latency" | "rtt" => Ok(MetricKind::Latency),
            "packet_loss" | "loss" => Ok(MetricKind::PacketLoss),
            "packet_reordering" | "reordering" => Ok(MetricKind::PacketReordering),
            "jitter" => Ok(MetricKind::Jitter),
            "mtu" => Ok(MetricKind::Mtu),
            "dns_resolution_time" | "dns_resolution" | "dns" => Ok(MetricKind::DnsResolution),
            "bandwidth" | "throughput" => Ok(MetricKind::Bandwidth),
            _ => Err(AppError::validation(format!(
                "Unknown metric '{}'. Valid metrics: {}",
                s,
                Self::valid_names()
            ))),
        }
    }
}

/// The host being measured, resolved once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Host name or address as given by the user
    pub input: String,
    pub address: IpAddr,
    pub resolved_at: DateTime<Utc>,
}

impl Target {
    pub fn new<S: Into<String>>(input: S, address: IpAddr) -> Self {
        Self {
            input: input.into(),
            address,
            resolved_at: Utc::now(),
        }
    }

    /// Target for a literal IP address, no resolution needed
    pub fn from_ip(address: IpAddr) -> Self {
        Self::new(address.to_string(), address)
    }

    pub fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    /// Bytes added to an echo payload on the wire: ICMP header plus IP header
    pub fn header_overhead(&self) -> usize {
        let ip_header = if self.is_ipv6() { 40 } else { 20 };
        8 + ip_header
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.input == self.address.to_string() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.input, self.address)
        }
    }
}

/// Final status of one metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Success,
    Failed,
    TimedOut,
}

impl MetricStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricStatus::Success => "success",
            MetricStatus::Failed => "failed",
            MetricStatus::TimedOut => "timed out",
        }
    }
}

/// Latency quality classification used for console coloring
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLevel {
    /// Below 50ms
    Good,
    /// 50-150ms
    Moderate,
    /// Above 150ms
    Poor,
}

impl PerformanceLevel {
    pub fn from_latency_ms(ms: f64) -> Self {
        if ms < 50.0 {
            Self::Good
        } else if ms < 150.0 {
            Self::Moderate
        } else {
            Self::Poor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_metric_names_round_trip() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.name().parse::<MetricKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_metric_aliases() {
        assert_eq!("dns".parse::<MetricKind>().unwrap(), MetricKind::DnsResolution);
        assert_eq!("Throughput".parse::<MetricKind>().unwrap(), MetricKind::Bandwidth);
        assert_eq!("packet-loss".parse::<MetricKind>().unwrap(), MetricKind::PacketLoss);
    }

    #[test]
    fn test_unknown_metric_names_valid_set() {
        let err = "bogus".parse::<MetricKind>().unwrap_err();
        assert_eq!(err.category(), "VALIDATION");
        assert!(err.to_string().contains("'bogus'"));
        assert!(err.to_string().contains("packet_reordering"));
    }

    #[test]
    fn test_parse_list_is_canonical_and_deduplicated() {
        let kinds = MetricKind::parse_list(&["mtu", "latency", "dns", "latency"]).unwrap();
        assert_eq!(kinds, vec![MetricKind::Latency, MetricKind::Mtu, MetricKind::DnsResolution]);

        let empty: [&str; 0] = [];
        assert_eq!(MetricKind::parse_list(&empty).unwrap(), MetricKind::ALL.to_vec());
        assert!(MetricKind::parse_list(&["latency", "nope"]).is_err());
    }

    #[test]
    fn test_serde_names_match_report_names() {
        for kind in MetricKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }

    #[test]
    fn test_probe_channel_usage() {
        assert!(MetricKind::Latency.uses_probe_channel());
        assert!(MetricKind::Mtu.uses_probe_channel());
        assert!(!MetricKind::DnsResolution.uses_probe_channel());
        assert!(!MetricKind::Bandwidth.uses_probe_channel());
    }

    #[test]
    fn test_target_overhead_and_display() {
        let v4 = Target::from_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
        assert_eq!(v4.header_overhead(), 28);
        assert_eq!(v4.to_string(), "8.8.8.8");

        let v6 = Target::new("dns.google", IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(v6.header_overhead(), 48);
        assert_eq!(v6.to_string(), "dns.google (::1)");
    }

    #[test]
    fn test_performance_level() {
        assert_eq!(PerformanceLevel::from_latency_ms(12.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_latency_ms(80.0), PerformanceLevel::Moderate);
        assert_eq!(PerformanceLevel::from_latency_ms(300.0), PerformanceLevel::Poor);
    }
}
