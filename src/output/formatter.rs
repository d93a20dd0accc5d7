//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation of the console report.

use crate::{
    error::{AppError, Result},
    models::{MetricResult, RunReport},
    types::MetricStatus,
};
use std::fmt::Write as _;

pub(crate) const REPORT_TITLE: &str = "Network Performance Test Report";

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format one metric block
    fn format_metric(&self, result: &MetricResult) -> Result<String>;

    /// Format a whole run: header, target line, one block per metric, footer
    fn format_report(&self, report: &RunReport) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show attempts, samples and duration per metric
    pub verbose_mode: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
        }
    }
}

pub(crate) fn fmt_error(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Format duration in human-readable format
pub(crate) fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1.0 {
        format!("{:.2}μs", duration_ms * 1000.0)
    } else if duration_ms < 1000.0 {
        format!("{:.1}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.2}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0) as u32;
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    fn format_details(&self, result: &MetricResult) -> String {
        format!(
            "  ({} samples, {} attempt{}, {})",
            result.samples,
            result.attempts,
            if result.attempts == 1 { "" } else { "s" },
            format_duration(result.duration_ms)
        )
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        Ok(format!("=== {} ===", title))
    }

    fn format_metric(&self, result: &MetricResult) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "{}:", result.metric.name().to_uppercase()).map_err(fmt_error)?;

        match (&result.status, &result.values) {
            (MetricStatus::Success, Some(values)) => {
                for (key, value) in values.display_fields() {
                    writeln!(output, "  {}: {}", key, value).map_err(fmt_error)?;
                }
            }
            _ => {
                writeln!(output, "  Test failed or not executed").map_err(fmt_error)?;
                if let Some(ref reason) = result.failure {
                    writeln!(output, "  reason: {}", reason).map_err(fmt_error)?;
                }
            }
        }

        if self.options.verbose_mode {
            writeln!(output, "{}", self.format_details(result)).map_err(fmt_error)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_report(&self, report: &RunReport) -> Result<String> {
        let header = self.format_header(REPORT_TITLE)?;
        let mut output = String::new();

        writeln!(output, "{}", header).map_err(fmt_error)?;
        writeln!(output, "Target: {}", report.target).map_err(fmt_error)?;
        for result in &report.metrics {
            writeln!(output).map_err(fmt_error)?;
            writeln!(output, "{}", self.format_metric(result)?).map_err(fmt_error)?;
        }
        writeln!(output).map_err(fmt_error)?;
        write!(output, "{}", "=".repeat(header.chars().count())).map_err(fmt_error)?;

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}
