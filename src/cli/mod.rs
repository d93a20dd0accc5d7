//! Command-line interface

use clap::{ArgAction, Parser};

/// Path Quality Tester - measure latency, jitter, loss, reordering, MTU,
/// DNS timing and bandwidth toward a host
#[derive(Parser, Debug, Clone)]
#[command(name = "pqt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Host name or IP address to measure [default: 8.8.8.8]
    #[arg(short, long)]
    pub target: Option<String>,

    /// Number of probes per stream (1-1000) [default: 10]
    #[arg(short, long)]
    pub samples: Option<u32>,

    /// Metrics to run, comma separated or repeated [default: all]
    ///
    /// Accepted: latency, packet_loss, packet_reordering, jitter, mtu,
    /// dns_resolution_time (dns), bandwidth (throughput)
    #[arg(short, long, value_delimiter = ',', action = ArgAction::Append)]
    pub metrics: Vec<String>,

    /// Interval between probe sends in milliseconds [default: 100]
    #[arg(long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Per-probe reply deadline in milliseconds [default: 1000]
    #[arg(long, value_name = "MS")]
    pub probe_timeout: Option<u64>,

    /// Echo payload size in bytes [default: 56]
    #[arg(long, value_name = "BYTES")]
    pub payload_size: Option<usize>,

    /// Time budget per metric attempt in seconds [default: 60]
    #[arg(long, value_name = "SECS", value_parser = parse_duration)]
    pub metric_timeout: Option<u64>,

    /// Attempts per metric before it is recorded as failed [default: 1]
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Run metrics concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Smallest payload size tried by MTU discovery [default: 548]
    #[arg(long, value_name = "BYTES")]
    pub mtu_min: Option<usize>,

    /// Largest payload size tried by MTU discovery [default: 1472]
    #[arg(long, value_name = "BYTES")]
    pub mtu_max: Option<usize>,

    /// Domains timed by the DNS metric (comma-separated)
    #[arg(long)]
    pub dns_domains: Option<String>,

    /// Base URL of the speed-test endpoint
    #[arg(long, value_name = "URL")]
    pub speedtest_url: Option<String>,

    /// Report file path [default: network_test_report_<timestamp>.json]
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Do not write the JSON report file
    #[arg(long)]
    pub no_save: bool,

    /// Print the JSON report to stdout instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.no_save && self.output.is_some() {
            return Err("Cannot specify both --output and --no-save".to_string());
        }

        if let (Some(min), Some(max)) = (self.mtu_min, self.mtu_max) {
            if min >= max {
                return Err(format!("--mtu-min ({}) must be below --mtu-max ({})", min, max));
            }
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a duration in whole seconds
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 3600 {
                Err("Duration cannot exceed 3600 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_overrides_unset() {
        let cli = Cli::parse_from(["pqt"]);
        assert!(cli.target.is_none());
        assert!(cli.samples.is_none());
        assert!(cli.metrics.is_empty());
        assert!(!cli.parallel);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_metrics_comma_and_repeat() {
        let cli = Cli::parse_from(["pqt", "-m", "latency,jitter", "--metrics", "mtu"]);
        assert_eq!(cli.metrics, vec!["latency", "jitter", "mtu"]);
    }

    #[test]
    fn test_full_argument_set() {
        let cli = Cli::parse_from([
            "pqt", "-t", "example.com", "-s", "25", "--interval", "50",
            "--probe-timeout", "500", "--metric-timeout", "30", "--max-attempts", "3",
            "--parallel", "--mtu-min", "100", "--mtu-max", "1500", "-o", "out.json",
        ]);
        assert_eq!(cli.target.as_deref(), Some("example.com"));
        assert_eq!(cli.samples, Some(25));
        assert_eq!(cli.interval, Some(50));
        assert_eq!(cli.probe_timeout, Some(500));
        assert_eq!(cli.metric_timeout, Some(30));
        assert_eq!(cli.max_attempts, Some(3));
        assert!(cli.parallel);
        assert_eq!(cli.output.as_deref(), Some("out.json"));
    }

    #[test]
    fn test_conflicting_flags() {
        let cli = Cli::parse_from(["pqt", "--color", "--no-color"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["pqt", "--no-save", "-o", "x.json"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["pqt", "--mtu-min", "1500", "--mtu-max", "100"]);
        assert!(cli.validate().unwrap_err().contains("--mtu-min"));
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("30"), Ok(30));
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("+5").is_err());
        assert!(parse_duration("3601").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn test_color_flags() {
        assert!(Cli::parse_from(["pqt", "--color"]).use_colors());
        assert!(!Cli::parse_from(["pqt", "--no-color"]).use_colors());
    }
}
