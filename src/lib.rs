//! Path Quality Tester
//!
//! Measures end-to-end network path quality toward a target host: latency,
//! jitter, packet loss, packet reordering and path MTU from active ICMP echo
//! probing, plus DNS resolution time and bandwidth from external
//! collaborators. Each run produces one structured report.

pub mod app;
pub mod bandwidth;
pub mod cli;
pub mod config;
pub mod dns;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod mtu;
pub mod output;
pub mod probe;
pub mod stats;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{MeasurementSettings, Orchestrator};
pub use models::{Config, MetricResult, MetricValues, RunReport};
pub use probe::{ProbeReply, ProbeStatus, ProbeTransport};
pub use stream::{ProbeOutcome, ProbeStream};
pub use types::{MetricKind, MetricStatus, Target};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build information stamped by build.rs
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_TARGET: &str = "8.8.8.8";
    pub const DEFAULT_SAMPLE_COUNT: u32 = 10;
    pub const MAX_SAMPLE_COUNT: u32 = 1000;
    pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(100);
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
    /// Same as `ping`
    pub const DEFAULT_PAYLOAD_SIZE: usize = 56;
    /// Largest ICMP echo payload that fits an IPv4 datagram
    pub const MAX_PAYLOAD_SIZE: usize = 65_507;
    pub const DEFAULT_METRIC_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;
    pub const MAX_ATTEMPTS: u32 = 5;
    /// 576 byte minimum IPv4 datagram minus headers
    pub const DEFAULT_MTU_MIN_PAYLOAD: usize = 548;
    /// 1500 byte Ethernet MTU minus headers
    pub const DEFAULT_MTU_MAX_PAYLOAD: usize = 1472;
    pub const DEFAULT_MTU_ATTEMPTS_PER_SIZE: u32 = 2;
    pub const DEFAULT_DNS_DOMAINS: &[&str] = &["google.com", "microsoft.com", "amazon.com"];
    pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_SPEEDTEST_URL: &str = "https://speed.cloudflare.com";
    pub const DEFAULT_DOWNLOAD_BYTES: u64 = 25_000_000;
    pub const DEFAULT_UPLOAD_BYTES: u64 = 10_000_000;
    pub const DEFAULT_BANDWIDTH_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
