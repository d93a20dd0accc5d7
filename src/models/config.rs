//! Configuration data model and validation

use crate::types::{AppError, MetricKind, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host name or IP address to measure
    #[serde(default = "default_target")]
    pub target: String,

    /// Probes per stream
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,

    /// Requested metric names; empty selects every metric
    #[serde(default)]
    pub metrics: Vec<String>,

    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Echo payload size for latency and loss probes
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,

    /// Hard deadline per metric attempt
    #[serde(default = "default_metric_timeout_secs")]
    pub metric_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Run metrics concurrently instead of one after another
    #[serde(default)]
    pub parallel: bool,

    /// Smallest payload size tried by MTU discovery
    #[serde(default = "default_mtu_min")]
    pub mtu_min_payload: usize,

    /// Largest payload size tried by MTU discovery
    #[serde(default = "default_mtu_max")]
    pub mtu_max_payload: usize,

    /// Domains timed by the DNS metric
    #[serde(default = "default_dns_domains")]
    pub dns_domains: Vec<String>,

    #[serde(default = "default_dns_timeout_secs")]
    pub dns_timeout_secs: u64,

    /// Base URL of a Cloudflare-compatible speed-test endpoint
    #[serde(default = "default_speedtest_url")]
    pub speedtest_url: String,

    #[serde(default = "default_download_bytes")]
    pub download_bytes: u64,

    #[serde(default = "default_upload_bytes")]
    pub upload_bytes: u64,

    /// Report file path; a timestamped name is used when unset
    #[serde(default)]
    pub output_path: Option<String>,

    /// Write the JSON report artifact
    #[serde(default = "default_save_report")]
    pub save_report: bool,

    /// Print the JSON report to stdout instead of the console summary
    #[serde(default)]
    pub json_output: bool,

    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: default_target(),
            sample_count: default_sample_count(),
            metrics: Vec::new(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            payload_size: default_payload_size(),
            metric_timeout_secs: default_metric_timeout_secs(),
            max_attempts: default_max_attempts(),
            parallel: false,
            mtu_min_payload: default_mtu_min(),
            mtu_max_payload: default_mtu_max(),
            dns_domains: default_dns_domains(),
            dns_timeout_secs: default_dns_timeout_secs(),
            speedtest_url: default_speedtest_url(),
            download_bytes: default_download_bytes(),
            upload_bytes: default_upload_bytes(),
            output_path: None,
            save_report: default_save_report(),
            json_output: false,
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn metric_timeout(&self) -> Duration {
        Duration::from_secs(self.metric_timeout_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    /// Upper bound on the wall time of one probe stream
    pub fn stream_duration_bound(&self) -> Duration {
        self.probe_interval() * self.sample_count + self.probe_timeout()
    }

    /// Requested metrics, validated and in canonical order
    pub fn selected_metrics(&self) -> Result<Vec<MetricKind>> {
        MetricKind::parse_list(&self.metrics)
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(AppError::validation("Target cannot be empty"));
        }

        self.selected_metrics()?;

        if self.sample_count == 0 || self.sample_count > crate::defaults::MAX_SAMPLE_COUNT {
            return Err(AppError::validation(format!(
                "Sample count must be between 1 and {}, got {}",
                crate::defaults::MAX_SAMPLE_COUNT,
                self.sample_count
            )));
        }

        if !(10..=10_000).contains(&self.probe_interval_ms) {
            return Err(AppError::validation("Probe interval must be between 10 and 10000 ms"));
        }

        if !(10..=60_000).contains(&self.probe_timeout_ms) {
            return Err(AppError::validation("Probe timeout must be between 10 and 60000 ms"));
        }

        if self.payload_size > crate::defaults::MAX_PAYLOAD_SIZE {
            return Err(AppError::validation(format!(
                "Payload size cannot exceed {} bytes",
                crate::defaults::MAX_PAYLOAD_SIZE
            )));
        }

        if self.mtu_min_payload == 0 || self.mtu_min_payload >= self.mtu_max_payload {
            return Err(AppError::validation(format!(
                "MTU search range is invalid: min {} must be positive and below max {}",
                self.mtu_min_payload, self.mtu_max_payload
            )));
        }

        if self.mtu_max_payload > crate::defaults::MAX_PAYLOAD_SIZE {
            return Err(AppError::validation(format!(
                "MTU search maximum cannot exceed {} bytes",
                crate::defaults::MAX_PAYLOAD_SIZE
            )));
        }

        if self.metric_timeout_secs == 0 || self.metric_timeout_secs > 3600 {
            return Err(AppError::validation("Metric timeout must be between 1 and 3600 seconds"));
        }

        if self.max_attempts == 0 || self.max_attempts > crate::defaults::MAX_ATTEMPTS {
            return Err(AppError::validation(format!(
                "Max attempts must be between 1 and {}",
                crate::defaults::MAX_ATTEMPTS
            )));
        }

        if self.dns_domains.is_empty() {
            return Err(AppError::validation("At least one DNS domain is required"));
        }

        if self.dns_timeout_secs == 0 || self.dns_timeout_secs > 60 {
            return Err(AppError::validation("DNS timeout must be between 1 and 60 seconds"));
        }

        match url::Url::parse(&self.speedtest_url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(_) => {
                return Err(AppError::config(format!(
                    "Speed-test URL must use http or https: {}",
                    self.speedtest_url
                )));
            }
            Err(e) => {
                return Err(AppError::config(format!(
                    "Invalid speed-test URL '{}': {}",
                    self.speedtest_url, e
                )));
            }
        }

        if self.download_bytes == 0 || self.upload_bytes == 0 {
            return Err(AppError::validation("Speed-test transfer sizes must be greater than 0"));
        }

        Ok(())
    }

    /// Merge `PQT_*` environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(target) = std::env::var("PQT_TARGET") {
            self.target = target.trim().to_string();
        }

        if let Ok(metrics) = std::env::var("PQT_METRICS") {
            self.metrics = split_list(&metrics);
        }

        if let Ok(domains) = std::env::var("PQT_DNS_DOMAINS") {
            self.dns_domains = split_list(&domains);
        }

        if let Ok(url) = std::env::var("PQT_SPEEDTEST_URL") {
            self.speedtest_url = url.trim().to_string();
        }

        parse_env("PQT_SAMPLES", &mut self.sample_count)?;
        parse_env("PQT_INTERVAL_MS", &mut self.probe_interval_ms)?;
        parse_env("PQT_PROBE_TIMEOUT_MS", &mut self.probe_timeout_ms)?;
        parse_env("PQT_PAYLOAD_SIZE", &mut self.payload_size)?;
        parse_env("PQT_METRIC_TIMEOUT_SECS", &mut self.metric_timeout_secs)?;
        parse_env("PQT_MAX_ATTEMPTS", &mut self.max_attempts)?;
        parse_env("PQT_MTU_MIN", &mut self.mtu_min_payload)?;
        parse_env("PQT_MTU_MAX", &mut self.mtu_max_payload)?;
        parse_env("PQT_ENABLE_COLOR", &mut self.enable_color)?;

        Ok(())
    }
}

/// Split a comma separated list, dropping empty entries
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_env<T>(key: &str, slot: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, raw, e)))?;
    }
    Ok(())
}

// Default value functions for serde
fn default_target() -> String {
    crate::defaults::DEFAULT_TARGET.to_string()
}

fn default_sample_count() -> u32 {
    crate::defaults::DEFAULT_SAMPLE_COUNT
}

fn default_probe_interval_ms() -> u64 {
    crate::defaults::DEFAULT_PROBE_INTERVAL.as_millis() as u64
}

fn default_probe_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

fn default_payload_size() -> usize {
    crate::defaults::DEFAULT_PAYLOAD_SIZE
}

fn default_metric_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_METRIC_TIMEOUT.as_secs()
}

fn default_max_attempts() -> u32 {
    crate::defaults::DEFAULT_MAX_ATTEMPTS
}

fn default_mtu_min() -> usize {
    crate::defaults::DEFAULT_MTU_MIN_PAYLOAD
}

fn default_mtu_max() -> usize {
    crate::defaults::DEFAULT_MTU_MAX_PAYLOAD
}

fn default_dns_domains() -> Vec<String> {
    crate::defaults::DEFAULT_DNS_DOMAINS
        .iter()
        .map(|&s| s.to_string())
        .collect()
}

fn default_dns_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_DNS_TIMEOUT.as_secs()
}

fn default_speedtest_url() -> String {
    crate::defaults::DEFAULT_SPEEDTEST_URL.to_string()
}

fn default_download_bytes() -> u64 {
    crate::defaults::DEFAULT_DOWNLOAD_BYTES
}

fn default_upload_bytes() -> u64 {
    crate::defaults::DEFAULT_UPLOAD_BYTES
}

fn default_save_report() -> bool {
    true
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
