//! Non-fatal configuration checks

use crate::{
    error::Result,
    models::Config,
    types::MetricKind,
};
use std::net::IpAddr;

/// Produces warnings about settings that are valid but likely to disappoint
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run `Config::validate` and then collect advisory warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let metrics = config.selected_metrics()?;
        let mut warnings = Vec::new();
        warnings.extend(Self::validate_timing(config, &metrics));
        warnings.extend(Self::validate_target(&config.target));
        warnings.extend(Self::validate_mtu_range(config, &metrics));
        warnings.extend(Self::validate_speedtest(config, &metrics));

        Ok(warnings)
    }

    fn validate_timing(config: &Config, metrics: &[MetricKind]) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if metrics.iter().any(|m| m.uses_probe_channel())
            && config.stream_duration_bound() > config.metric_timeout()
        {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "A probe stream can take up to {:.1}s but the metric timeout is {}s; probe metrics may time out",
                    config.stream_duration_bound().as_secs_f64(),
                    config.metric_timeout_secs
                ),
            ));
        }

        if metrics.contains(&MetricKind::Jitter) && config.sample_count < 2 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Jitter needs at least 2 samples; the jitter metric will fail".to_string(),
            ));
        }

        if config.probe_timeout_ms > config.probe_interval_ms * 20 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Probe timeout {}ms is much longer than the {}ms interval; many probes will be in flight at once",
                    config.probe_timeout_ms, config.probe_interval_ms
                ),
            ));
        }

        warnings
    }

    fn validate_target(target: &str) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if let Ok(ip) = target.parse::<IpAddr>() {
            let local = match ip {
                IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
                IpAddr::V6(v6) => v6.is_loopback(),
            };
            if local {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Target {} is a local address; results will not reflect an internet path", ip),
                ));
            }
        }

        warnings
    }

    fn validate_mtu_range(config: &Config, metrics: &[MetricKind]) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if metrics.contains(&MetricKind::Mtu) && config.mtu_max_payload > 8972 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "MTU search maximum {} exceeds a 9000 byte jumbo frame; the upper range is unlikely to pass",
                    config.mtu_max_payload
                ),
            ));
        }

        warnings
    }

    fn validate_speedtest(config: &Config, metrics: &[MetricKind]) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if metrics.contains(&MetricKind::Bandwidth) && config.speedtest_url.starts_with("http://") {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Speed-test URL '{}' uses HTTP; middleboxes may cache or shape the transfer",
                    config.speedtest_url
                ),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Validation warning with level and message
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        if use_color {
            use colored::Colorize;
            let level = match self.level {
                ValidationLevel::Info => self.level.as_str().blue(),
                ValidationLevel::Warning => self.level.as_str().yellow(),
            };
            format!("[{}] {}", level, self.message)
        } else {
            format!("[{}] {}", self.level.as_str(), self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
