//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, Result},
    models::{config::split_list, Config},
};

/// Combines defaults, the .env file, `PQT_*` variables and CLI arguments
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        self.cli.validate().map_err(AppError::validation)?;

        let mut config = Config::default();

        EnvManager::load_env_file()?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(target) = &cli.target {
            config.target = target.trim().to_string();
        }
        if let Some(samples) = cli.samples {
            config.sample_count = samples;
        }
        if !cli.metrics.is_empty() {
            config.metrics = cli.metrics.iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }
        if let Some(interval) = cli.interval {
            config.probe_interval_ms = interval;
        }
        if let Some(timeout) = cli.probe_timeout {
            config.probe_timeout_ms = timeout;
        }
        if let Some(size) = cli.payload_size {
            config.payload_size = size;
        }
        if let Some(timeout) = cli.metric_timeout {
            config.metric_timeout_secs = timeout;
        }
        if let Some(attempts) = cli.max_attempts {
            config.max_attempts = attempts;
        }
        if let Some(min) = cli.mtu_min {
            config.mtu_min_payload = min;
        }
        if let Some(max) = cli.mtu_max {
            config.mtu_max_payload = max;
        }
        if let Some(domains) = &cli.dns_domains {
            config.dns_domains = split_list(domains);
        }
        if let Some(url) = &cli.speedtest_url {
            config.speedtest_url = url.trim().to_string();
        }
        if cli.output.is_some() {
            config.output_path = cli.output.clone();
        }

        config.parallel |= cli.parallel;
        config.save_report = !cli.no_save;
        config.json_output = cli.json;

        if cli.color {
            config.enable_color = true;
        } else if cli.no_color {
            config.enable_color = false;
        } else {
            config.enable_color = config.enable_color && cli.use_colors();
        }

        // These are CLI-only
        config.verbose = cli.verbose;
        config.debug = cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Configuration summary for verbose and debug output
pub fn display_config_summary(config: &Config) -> String {
    let metrics = match config.selected_metrics() {
        Ok(kinds) => kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(", "),
        Err(_) => config.metrics.join(", "),
    };

    let mut summary = Vec::new();
    summary.push(format!("Target: {}", config.target));
    summary.push(format!("Metrics: {}", metrics));
    summary.push(format!("Samples: {}", config.sample_count));
    summary.push(format!("Probe interval: {}ms", config.probe_interval_ms));
    summary.push(format!("Probe timeout: {}ms", config.probe_timeout_ms));
    summary.push(format!("Metric timeout: {}s", config.metric_timeout_secs));
    summary.push(format!("Max attempts: {}", config.max_attempts));
    summary.push(format!("MTU range: {}-{} bytes", config.mtu_min_payload, config.mtu_max_payload));
    summary.push(format!("DNS domains: {}", config.dns_domains.join(", ")));
    summary.push(format!("Speed-test URL: {}", config.speedtest_url));
    summary.push(format!("Parallel: {}", config.parallel));
    summary.push(format!("Color Output: {}", config.enable_color));

    let active = EnvManager::active_vars();
    if !active.is_empty() {
        summary.push(format!("Environment overrides: {}", active.join(", ")));
    }

    summary.join("\n")
}
