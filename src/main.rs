//! Path Quality Tester - Main CLI Application
//!
//! Measures latency, jitter, loss, reordering, path MTU, DNS resolution time
//! and bandwidth toward one host and writes a JSON report.

use clap::Parser;
use path_quality_tester::{app::App, cli::Cli, error::ErrorReporter};
use std::process;

#[tokio::main]
async fn main() {
    // Set up better panic handling
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue with the command line you used.");
        process::exit(1);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(!cli.no_color, cli.verbose || cli.debug);

    let result = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}
