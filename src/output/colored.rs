//! Colored formatter implementation with terminal color support
//!
//! Uses ANSI colors to flag failed metrics and to grade latency values.

use super::formatter::{fmt_error, format_duration, FormattingOptions, OutputFormatter, REPORT_TITLE};
use crate::{
    error::Result,
    models::{MetricResult, MetricValues, RunReport},
    types::{MetricStatus, PerformanceLevel},
};
use colored::*;
use std::fmt::Write as _;

/// Color for a latency grade
pub fn performance_color(level: PerformanceLevel) -> Color {
    match level {
        PerformanceLevel::Good => Color::Green,
        PerformanceLevel::Moderate => Color::Yellow,
        PerformanceLevel::Poor => Color::Red,
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    /// Millisecond fields of latency-like metrics are graded, the rest stay plain
    fn format_value(&self, values: &MetricValues, key: &str, value: &str) -> ColoredString {
        let graded = values.headline_latency_ms().is_some() && key.ends_with("_ms") && key != "stddev_ms";
        match value.parse::<f64>() {
            Ok(ms) if graded => self.colorize(value, performance_color(PerformanceLevel::from_latency_ms(ms))),
            _ => value.normal(),
        }
    }

    fn status_marker(&self, status: MetricStatus) -> ColoredString {
        match status {
            MetricStatus::Success => self.colorize("✓", self.color_scheme.success),
            MetricStatus::Failed => self.colorize("✗", self.color_scheme.error),
            MetricStatus::TimedOut => self.colorize("⏱", self.color_scheme.warning),
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let header = format!("=== {} ===", title);
        if self.options.enable_color {
            Ok(header.color(self.color_scheme.header).bold().to_string())
        } else {
            Ok(header)
        }
    }

    fn format_metric(&self, result: &MetricResult) -> Result<String> {
        let mut output = String::new();
        writeln!(
            output,
            "{} {}",
            self.status_marker(result.status),
            self.bold(&format!("{}:", result.metric.name().to_uppercase()))
        )
        .map_err(fmt_error)?;

        match (&result.status, &result.values) {
            (MetricStatus::Success, Some(values)) => {
                for (key, value) in values.display_fields() {
                    writeln!(output, "  {}: {}", key, self.format_value(values, key, &value)).map_err(fmt_error)?;
                }
            }
            _ => {
                writeln!(
                    output,
                    "  {}",
                    self.colorize("Test failed or not executed", self.color_scheme.error)
                )
                .map_err(fmt_error)?;
                if let Some(ref reason) = result.failure {
                    writeln!(output, "  reason: {}", self.colorize(reason, self.color_scheme.warning))
                        .map_err(fmt_error)?;
                }
            }
        }

        if self.options.verbose_mode {
            let details = format!(
                "  ({} samples, {} attempt{}, {})",
                result.samples,
                result.attempts,
                if result.attempts == 1 { "" } else { "s" },
                format_duration(result.duration_ms)
            );
            writeln!(output, "{}", self.colorize(&details, self.color_scheme.muted)).map_err(fmt_error)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_report(&self, report: &RunReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.format_header(REPORT_TITLE)?).map_err(fmt_error)?;
        writeln!(
            output,
            "{} {}",
            self.dimmed("Target:"),
            self.colorize(&report.target.to_string(), self.color_scheme.info)
        )
        .map_err(fmt_error)?;

        for result in &report.metrics {
            writeln!(output).map_err(fmt_error)?;
            writeln!(output, "{}", self.format_metric(result)?).map_err(fmt_error)?;
        }

        writeln!(output).map_err(fmt_error)?;
        let summary = format!("{}/{} metrics succeeded", report.successful_count(), report.metrics.len());
        let color = if report.successful_count() == report.metrics.len() {
            self.color_scheme.success
        } else if report.all_failed() {
            self.color_scheme.error
        } else {
            self.color_scheme.warning
        };
        write!(output, "{}", self.colorize(&summary, color)).map_err(fmt_error)?;

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✗", self.color_scheme.error), self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("⚠", self.color_scheme.warning), self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✓", self.color_scheme.success), self.colorize(message, self.color_scheme.success)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricKind, Target};
    use chrono::Utc;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn uncolored() -> ColoredFormatter {
        ColoredFormatter::new(FormattingOptions { enable_color: false, verbose_mode: false })
    }

    #[test]
    fn test_performance_colors() {
        assert_eq!(performance_color(PerformanceLevel::Good), Color::Green);
        assert_eq!(performance_color(PerformanceLevel::Poor), Color::Red);
    }

    #[test]
    fn test_report_summary_line() {
        let metrics = vec![
            MetricResult::success(
                MetricKind::Jitter,
                MetricValues::Jitter { jitter_ms: 1.5, min_ms: 0.5, max_ms: 3.0 },
                10,
                1,
                Duration::from_millis(900),
            ),
            MetricResult::timed_out(MetricKind::Bandwidth, Duration::from_secs(60), 1, Duration::from_secs(60)),
        ];
        let report = RunReport::new(
            "session".to_string(),
            Target::from_ip(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7))),
            10,
            Utc::now(),
            metrics,
        );

        let output = uncolored().format_report(&report).unwrap();
        assert!(output.contains("JITTER:"));
        assert!(output.contains("jitter_ms: 1.50"));
        assert!(output.contains("⏱ BANDWIDTH:"));
        assert!(output.contains("time budget"));
        assert!(output.ends_with("1/2 metrics succeeded"));
    }
}
