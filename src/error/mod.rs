//! Error handling for the path quality tester

use thiserror::Error;

/// Custom error types for the path quality tester
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (metric names, ranges, targets)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Probe channel errors that make probing impossible
    #[error("Transport error: {0}")]
    Transport(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// DNS resolution errors
    #[error("DNS resolution error: {0}")]
    DnsResolution(String),

    /// HTTP request errors from the speed-test collaborator
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// I/O errors (report files, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (URLs, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// A metric ran but could not produce a value
    #[error("Measurement error: {0}")]
    Measurement(String),

    /// Statistics calculation errors
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create a new DNS resolution error
    pub fn dns_resolution<S: Into<String>>(message: S) -> Self {
        Self::DnsResolution(message.into())
    }

    /// Create a new HTTP request error
    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new measurement error
    pub fn measurement<S: Into<String>>(message: S) -> Self {
        Self::Measurement(message.into())
    }

    /// Create a new statistics error
    pub fn statistics<S: Into<String>>(message: S) -> Self {
        Self::Statistics(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Transport(_) => "TRANSPORT",
            Self::Network(_) => "NETWORK",
            Self::DnsResolution(_) => "DNS",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Measurement(_) => "MEASURE",
            Self::Statistics(_) => "STATS",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if a metric that failed with this error is worth another attempt
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::HttpRequest(_) | Self::Timeout(_) | Self::DnsResolution(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::Transport(_) => false,
            Self::Io(_) | Self::Measurement(_) | Self::Statistics(_) | Self::Internal(_) => false,
        }
    }

    /// Hints printed under a fatal error
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => &[
                "Run with --help to see accepted options and metric names",
                "Check PQT_* variables in your environment or .env file",
            ],
            Self::Transport(_) => &[
                "Raw ICMP sockets need root or CAP_NET_RAW",
                "On Linux, unprivileged ICMP needs your group in net.ipv4.ping_group_range",
                "dns_resolution_time and bandwidth run without the probe channel",
            ],
            Self::DnsResolution(_) => &[
                "Check that the target host name exists",
                "Pass an IP address with --target to skip resolution",
            ],
            Self::Network(_) | Self::HttpRequest(_) => &[
                "Check your internet connection",
                "The speed-test endpoint may be down; try a different --speedtest-url",
            ],
            Self::Timeout(_) => &["Increase --metric-timeout or --probe-timeout"],
            Self::Io(_) => &["Check permissions of the report directory, or pass --no-save"],
            Self::Measurement(_) | Self::Statistics(_) => &[],
            Self::Internal(_) => &["This is likely a bug. Please report it with the command line you used"],
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,  // Invalid configuration/usage
            Self::Network(_) | Self::DnsResolution(_) | Self::HttpRequest(_) => 2,  // Network issues
            Self::Timeout(_) => 3,
            Self::Io(_) => 5,
            Self::Measurement(_) | Self::Statistics(_) => 6,
            Self::Transport(_) => 7,  // Probe channel unavailable
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Network(_) | Self::DnsResolution(_) | Self::HttpRequest(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::Transport(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Io(_) | Self::Measurement(_) | Self::Statistics(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<trust_dns_resolver::error::ResolveError> for AppError {
    fn from(error: trust_dns_resolver::error::ResolveError) -> Self {
        Self::dns_resolution(error.to_string())
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(error: std::net::AddrParseError) -> Self {
        Self::parse(format!("IP address parse error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal(format!("Probe task failed: {}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Prints fatal errors to stderr
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// The error line followed by its hints
    pub fn render(&self, error: &AppError) -> String {
        let mut output = error.format_for_console(self.use_color);

        let suggestions = error.suggestions();
        if !suggestions.is_empty() {
            output.push_str(&format!("\n\n{} help:", error.category()));
            for suggestion in suggestions {
                output.push_str(&format!("\n  - {}", suggestion));
            }
        }

        if self.verbose && error.is_recoverable() {
            let hint = "This error might be temporary. You can try running the command again.";
            output.push_str("\n\n");
            if self.use_color {
                use colored::Colorize;
                output.push_str(&hint.green().to_string());
            } else {
                output.push_str(hint);
            }
        }

        output
    }

    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}
