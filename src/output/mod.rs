//! Output formatting and the report artifact
//!
//! Console rendering comes in a colored and a plain flavor behind the
//! [`OutputFormatter`] trait; the JSON report is written by [`ReportWriter`].

mod colored;
mod formatter;
mod report;

pub use colored::{performance_color, ColorScheme, ColoredFormatter};
pub use formatter::{FormattingOptions, OutputFormatter, PlainFormatter};
pub use report::{default_report_name, ReportWriter};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }
}
