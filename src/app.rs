//! Main application orchestration and execution

use crate::{
    bandwidth::SpeedTestClient,
    cli::Cli,
    config::{display_config_summary, load_config, validate_config},
    defaults,
    dns::{self, SystemDnsTimer},
    error::Result,
    executor::{MeasurementSettings, Orchestrator},
    logging::LoggerFactory,
    models::{Config, RunReport},
    output::{OutputFormatter, OutputFormatterFactory, ReportWriter},
    probe::{IcmpTransport, ProbeTransport},
};
use std::sync::Arc;
use std::time::Instant;

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self { cli })
    }

    /// Run one measurement session.
    ///
    /// Configuration and metric-name errors surface before any packet is
    /// sent. Failing to open the probe channel aborts the run; individual
    /// metric failures only show up in the report.
    pub async fn run(self) -> Result<RunReport> {
        let config = load_config(self.cli.clone())?;
        let metrics = config.selected_metrics()?;
        let warnings = validate_config(&config)?;

        let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);

        if config.debug {
            eprintln!(
                "{} v{} ({}, built {}{})",
                crate::PKG_NAME,
                crate::VERSION,
                crate::TARGET_TRIPLE,
                crate::BUILD_TIME,
                crate::GIT_COMMIT.map(|c| format!(", commit {}", c)).unwrap_or_default()
            );
            eprintln!("\nConfiguration Summary:");
            eprintln!("{}", display_config_summary(&config));
        }

        if !warnings.is_empty() {
            eprintln!("Configuration Warnings:");
            for warning in &warnings {
                eprintln!("  {}", warning.format(config.enable_color));
            }
        }

        let loggers = LoggerFactory::new(&config);
        let probe_logger = loggers.create_probe_logger().await;
        let error_logger = loggers.create_error_logger().await;

        let dns = Arc::new(SystemDnsTimer::new());
        let resolve_start = Instant::now();
        let target = match dns::resolve_target(&config.target, dns.as_ref()).await {
            Ok(target) => target,
            Err(e) => {
                error_logger.log_error(&e, Some("target resolution"), None).await;
                return Err(e);
            }
        };
        probe_logger
            .log_target_resolved(&target.input, &target.address.to_string(), resolve_start.elapsed())
            .await;

        let bandwidth = Arc::new(SpeedTestClient::new(
            &config.speedtest_url,
            config.download_bytes,
            config.upload_bytes,
            defaults::DEFAULT_BANDWIDTH_TIMEOUT,
            probe_logger.clone(),
        )?);

        let mut orchestrator = Orchestrator::new(MeasurementSettings::from(&config), dns, bandwidth)
            .with_loggers(loggers.create_metric_logger().await, probe_logger.clone())
            .with_session_id(loggers.session_id());

        if metrics.iter().any(|metric| metric.uses_probe_channel()) {
            let transport = match IcmpTransport::open(&target) {
                Ok(transport) => transport,
                Err(e) => {
                    error_logger.log_error(&e, Some("probe channel"), None).await;
                    return Err(e);
                }
            };
            probe_logger
                .log_channel_open(&transport.describe(), &target.to_string())
                .await;
            orchestrator = orchestrator.with_transport(Arc::new(transport));
        }

        if config.verbose && !config.json_output {
            eprintln!(
                "Measuring {} toward {} with {} samples per stream",
                metrics.iter().map(|m| m.name()).collect::<Vec<_>>().join(", "),
                target,
                config.sample_count
            );
        }

        let report = orchestrator.run_all(&target, &metrics, config.sample_count).await;

        self.emit(&config, formatter.as_ref(), &report).await?;
        Ok(report)
    }

    /// Print the report and write the artifact
    async fn emit(&self, config: &Config, formatter: &dyn OutputFormatter, report: &RunReport) -> Result<()> {
        if config.json_output {
            println!("{}", ReportWriter::render(report)?);
        } else {
            println!("{}", formatter.format_report(report)?);
        }

        if config.save_report {
            let writer = ReportWriter::new(config.output_path.as_deref());
            let path = writer.write(report).await?;
            eprintln!("{}", formatter.format_success(&format!("Report saved to {}", path.display()))?);
        }

        if report.all_failed() {
            eprintln!("{}", formatter.format_warning("every requested metric failed")?);
        }

        Ok(())
    }
}
