//! Structured logging for the path quality tester
//!
//! Entries carry a level, a component name, an optional correlation ID and
//! structured fields. [`LoggerFactory`] creates the loggers of one run, all
//! sharing a session ID, and they are passed explicitly to the components
//! that need them. Everything is written to stderr so that stdout only ever
//! carries the report.

use crate::error::AppError;
use crate::models::{Config, MetricResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

/// One structured log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Component that emitted the entry
    pub logger: String,
    /// Ties together the entries of one metric run
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable single line
    Console,
    /// One JSON object per line, selected by `--debug`
    Json,
}

#[derive(Clone)]
pub struct Logger {
    /// `None` drops every entry
    min_level: Option<LogLevel>,
    use_color: bool,
    format: LogFormat,
    name: String,
    session_id: Arc<RwLock<Option<String>>>,
}

impl Logger {
    /// Create a logger whose level and format follow the run configuration:
    /// `--debug` logs everything as JSON, `--verbose` logs progress, and
    /// otherwise only warnings and errors are shown.
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level: Some(min_level),
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            session_id: Arc::new(RwLock::new(None)),
        }
    }

    /// A logger that drops everything, for library callers and tests
    pub fn silent() -> Self {
        Self {
            min_level: None,
            use_color: false,
            format: LogFormat::Console,
            name: "SILENT".to_string(),
            session_id: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_session_id(&self, session_id: String) {
        *self.session_id.write().await = Some(session_id);
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        self.min_level.is_some_and(|min| level >= min)
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        if let Some(session_id) = self.session_id.read().await.as_ref() {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }

        let output = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
        };

        let _ = writeln!(io::stderr(), "{}", output);
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry.fields.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!("{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}", entry.message),
        }
    }
}

/// Builder for one log entry
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Duration in milliseconds
    pub fn elapsed(self, elapsed: Duration) -> Self {
        self.field("elapsed_ms", elapsed.as_secs_f64() * 1000.0)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for metric execution: start, completion and retries
#[derive(Clone)]
pub struct MetricLogger {
    logger: Logger,
}

impl MetricLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub async fn log_metric_start(&self, metric: &str, attempt: u32, correlation_id: &str) {
        self.logger.debug(&format!("Measuring {} (attempt {})", metric, attempt))
            .correlation_id(correlation_id)
            .field("metric", metric)
            .field("attempt", attempt)
            .log()
            .await;
    }

    /// Log the final record of one metric
    pub async fn log_metric_result(&self, result: &MetricResult, correlation_id: &str) {
        let name = result.metric.name();
        let (level, message) = match &result.failure {
            None => (LogLevel::Info, format!("{} completed with {} samples", name, result.samples)),
            Some(reason) => (LogLevel::Warn, format!("{} failed: {}", name, reason)),
        };

        self.logger.log(level, &message)
            .correlation_id(correlation_id)
            .field("metric", name)
            .field("status", result.status)
            .field("samples", result.samples)
            .field("attempts", result.attempts)
            .field("duration_ms", result.duration_ms)
            .log()
            .await;
    }

    pub async fn log_retry(&self, metric: &str, attempt: u32, error: &AppError, correlation_id: &str) {
        self.logger.info(&format!("Retrying {} after attempt {}: {}", metric, attempt, error))
            .correlation_id(correlation_id)
            .field("metric", metric)
            .field("attempt", attempt)
            .error_info(error)
            .log()
            .await;
    }
}

/// Logger for the probe channel and the external collaborators
#[derive(Clone)]
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Log which kind of probe channel was opened
    pub async fn log_channel_open(&self, description: &str, target: &str) {
        self.logger.info(&format!("Opened probe channel: {}", description))
            .field("channel", description)
            .field("target", target)
            .log()
            .await;
    }

    pub async fn log_target_resolved(&self, input: &str, address: &str, elapsed: Duration) {
        self.logger.info(&format!("Resolved {} to {}", input, address))
            .field("input", input)
            .field("address", address)
            .elapsed(elapsed)
            .log()
            .await;
    }

    /// Log one DNS timing lookup
    pub async fn log_dns_lookup(&self, domain: &str, outcome: std::result::Result<Duration, &AppError>) {
        match outcome {
            Ok(elapsed) => {
                self.logger.debug(&format!("DNS lookup for {} took {:.2}ms", domain, elapsed.as_secs_f64() * 1000.0))
                    .field("domain", domain)
                    .field("success", true)
                    .elapsed(elapsed)
                    .log()
                    .await;
            }
            Err(error) => {
                self.logger.warn(&format!("DNS lookup for {} failed: {}", domain, error))
                    .field("domain", domain)
                    .field("success", false)
                    .error_info(error)
                    .log()
                    .await;
            }
        }
    }

    /// Log one speed-test transfer direction
    pub async fn log_transfer(&self, direction: &str, outcome: std::result::Result<f64, &AppError>) {
        match outcome {
            Ok(mbps) => {
                self.logger.debug(&format!("{} speed {:.2} Mbps", direction, mbps))
                    .field("direction", direction)
                    .field("mbps", mbps)
                    .log()
                    .await;
            }
            Err(error) => {
                self.logger.warn(&format!("{} test failed: {}", direction, error))
                    .field("direction", direction)
                    .error_info(error)
                    .log()
                    .await;
            }
        }
    }
}

/// Error event logger with enhanced context
#[derive(Clone)]
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Log an application error with full context
    pub async fn log_error(&self, error: &AppError, context: Option<&str>, correlation_id: Option<&str>) {
        let message = if let Some(ctx) = context {
            format!("{}: {}", ctx, error)
        } else {
            error.to_string()
        };

        let mut builder = self.logger.error(&message)
            .error_info(error);

        if let Some(id) = correlation_id {
            builder = builder.correlation_id(id);
        }

        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }

        builder.log().await;
    }
}

/// Creates the loggers of one run, all sharing a session ID
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_metric_logger(&self) -> MetricLogger {
        MetricLogger::new(self.create_logger("METRIC").await)
    }

    pub async fn create_probe_logger(&self) -> ProbeLogger {
        ProbeLogger::new(self.create_logger("PROBE").await)
    }

    pub async fn create_error_logger(&self) -> ErrorEventLogger {
        ErrorEventLogger::new(self.create_logger("ERR").await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
