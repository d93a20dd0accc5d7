//! Metric orchestration
//!
//! The [`Orchestrator`] runs each requested metric under its own time budget,
//! retries recoverable measurement errors and folds every outcome, good or bad, into a
//! [`RunReport`].

use crate::{
    bandwidth::BandwidthTester,
    defaults,
    dns::{self, DnsTimer},
    error::{AppError, Result},
    logging::{Logger, MetricLogger, ProbeLogger},
    models::{Config, MetricResult, MetricValues, RunReport},
    mtu::MtuDiscovery,
    probe::ProbeTransport,
    stats,
    stream::{ProbeOutcome, ProbeStream},
    types::{MetricKind, Target},
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Execution parameters of one run
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSettings {
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub payload_size: usize,
    /// Hard deadline of one metric attempt; overrunning it ends the metric
    pub metric_timeout: Duration,
    pub max_attempts: u32,
    pub parallel: bool,
    pub mtu_min_payload: usize,
    pub mtu_max_payload: usize,
    pub mtu_attempts_per_size: u32,
    pub dns_domains: Vec<String>,
    pub dns_timeout: Duration,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            probe_interval: defaults::DEFAULT_PROBE_INTERVAL,
            probe_timeout: defaults::DEFAULT_PROBE_TIMEOUT,
            payload_size: defaults::DEFAULT_PAYLOAD_SIZE,
            metric_timeout: defaults::DEFAULT_METRIC_TIMEOUT,
            max_attempts: defaults::DEFAULT_MAX_ATTEMPTS,
            parallel: false,
            mtu_min_payload: defaults::DEFAULT_MTU_MIN_PAYLOAD,
            mtu_max_payload: defaults::DEFAULT_MTU_MAX_PAYLOAD,
            mtu_attempts_per_size: defaults::DEFAULT_MTU_ATTEMPTS_PER_SIZE,
            dns_domains: defaults::DEFAULT_DNS_DOMAINS.iter().map(|d| d.to_string()).collect(),
            dns_timeout: defaults::DEFAULT_DNS_TIMEOUT,
        }
    }
}

impl From<&Config> for MeasurementSettings {
    fn from(config: &Config) -> Self {
        Self {
            probe_interval: config.probe_interval(),
            probe_timeout: config.probe_timeout(),
            payload_size: config.payload_size,
            metric_timeout: config.metric_timeout(),
            max_attempts: config.max_attempts,
            parallel: config.parallel,
            mtu_min_payload: config.mtu_min_payload,
            mtu_max_payload: config.mtu_max_payload,
            mtu_attempts_per_size: defaults::DEFAULT_MTU_ATTEMPTS_PER_SIZE,
            dns_domains: config.dns_domains.clone(),
            dns_timeout: config.dns_timeout(),
        }
    }
}

/// Runs metrics against one target and assembles the report
pub struct Orchestrator {
    settings: MeasurementSettings,
    transport: Option<Arc<dyn ProbeTransport>>,
    dns: Arc<dyn DnsTimer>,
    bandwidth: Arc<dyn BandwidthTester>,
    metric_logger: MetricLogger,
    probe_logger: ProbeLogger,
    session_id: String,
}

impl Orchestrator {
    /// Create an orchestrator without a probe channel. Probe metrics fail
    /// until one is attached with [`Orchestrator::with_transport`].
    pub fn new(
        settings: MeasurementSettings,
        dns: Arc<dyn DnsTimer>,
        bandwidth: Arc<dyn BandwidthTester>,
    ) -> Self {
        Self {
            settings,
            transport: None,
            dns,
            bandwidth,
            metric_logger: MetricLogger::new(Logger::silent()),
            probe_logger: ProbeLogger::new(Logger::silent()),
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn ProbeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_loggers(mut self, metric_logger: MetricLogger, probe_logger: ProbeLogger) -> Self {
        self.metric_logger = metric_logger;
        self.probe_logger = probe_logger;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn settings(&self) -> &MeasurementSettings {
        &self.settings
    }

    /// Validate metric names, then run them. Nothing is sent when a name is
    /// unknown.
    pub async fn run_named<S: AsRef<str>>(
        &self,
        target: &Target,
        names: &[S],
        sample_count: u32,
    ) -> Result<RunReport> {
        let metrics = MetricKind::parse_list(names)?;
        Ok(self.run_all(target, &metrics, sample_count).await)
    }

    /// Run the requested metrics in canonical order, once each.
    ///
    /// Never fails: a metric that cannot be measured is recorded as failed
    /// or timed out in the report.
    pub async fn run_all(&self, target: &Target, requested: &[MetricKind], sample_count: u32) -> RunReport {
        let mut metrics = requested.to_vec();
        metrics.sort();
        metrics.dedup();

        let started_at = Utc::now();

        let results = if self.settings.parallel {
            join_all(metrics.iter().map(|metric| self.run_metric(target, *metric, sample_count))).await
        } else {
            let mut results = Vec::with_capacity(metrics.len());
            for metric in &metrics {
                results.push(self.run_metric(target, *metric, sample_count).await);
            }
            results
        };

        RunReport::new(self.session_id.clone(), target.clone(), sample_count, started_at, results)
    }

    /// Run one metric with its time budget and retry policy
    async fn run_metric(&self, target: &Target, metric: MetricKind, sample_count: u32) -> MetricResult {
        let start = Instant::now();
        let correlation_id = Uuid::new_v4().to_string();
        let max_attempts = self.settings.max_attempts.max(1);
        let budget = self.settings.metric_timeout;
        let mut attempt = 0;

        let result = loop {
            attempt += 1;
            self.metric_logger.log_metric_start(metric.name(), attempt, &correlation_id).await;

            let error = match tokio::time::timeout(budget, self.measure(target, metric, sample_count)).await {
                Ok(Ok((values, samples))) => {
                    break MetricResult::success(metric, values, samples, attempt, start.elapsed());
                }
                Ok(Err(error)) => error,
                // An overrun abandons the metric; it is never re-run
                Err(_) => break MetricResult::timed_out(metric, budget, attempt, start.elapsed()),
            };

            if error.is_recoverable() && attempt < max_attempts {
                self.metric_logger
                    .log_retry(metric.name(), attempt, &error, &correlation_id)
                    .await;
                continue;
            }

            break MetricResult::failed(metric, error.to_string(), 0, attempt, start.elapsed());
        };

        self.metric_logger.log_metric_result(&result, &correlation_id).await;
        result
    }

    /// One attempt at one metric: its values and the samples behind them
    async fn measure(&self, target: &Target, metric: MetricKind, sample_count: u32) -> Result<(MetricValues, usize)> {
        match metric {
            MetricKind::Latency => {
                let summary = stats::summarize(&self.probe_stream(target, sample_count).await?)?;
                Ok((
                    MetricValues::Latency {
                        min_ms: summary.min_ms,
                        max_ms: summary.max_ms,
                        mean_ms: summary.mean_ms,
                        stddev_ms: summary.stddev_ms,
                        median_ms: summary.median_ms,
                    },
                    summary.samples,
                ))
            }
            MetricKind::PacketLoss => {
                let report = stats::classify(&self.probe_stream(target, sample_count).await?);
                Ok((
                    MetricValues::PacketLoss {
                        loss_rate_percent: report.loss_percent(),
                        packets_sent: report.issued,
                        packets_received: report.received(),
                    },
                    report.issued,
                ))
            }
            MetricKind::PacketReordering => {
                let report = stats::classify(&self.probe_stream(target, sample_count).await?);
                if report.received() == 0 {
                    return Err(AppError::statistics("no successful probes"));
                }
                Ok((
                    MetricValues::PacketReordering {
                        reorder_count: report.reorder_count,
                        reorder_rate_percent: report.reorder_percent(),
                    },
                    report.received(),
                ))
            }
            MetricKind::Jitter => {
                let summary = stats::summarize(&self.probe_stream(target, sample_count).await?)?;
                let jitter = summary.require_jitter()?;
                Ok((
                    MetricValues::Jitter {
                        jitter_ms: jitter.jitter_ms,
                        min_ms: jitter.min_ms,
                        max_ms: jitter.max_ms,
                    },
                    summary.samples,
                ))
            }
            MetricKind::Mtu => {
                let outcome = MtuDiscovery::new(self.transport()?)
                    .with_attempts_per_size(self.settings.mtu_attempts_per_size)
                    .discover(
                        target,
                        self.settings.mtu_min_payload,
                        self.settings.mtu_max_payload,
                        self.settings.probe_timeout,
                    )
                    .await?;
                Ok((
                    MetricValues::Mtu {
                        mtu_bytes: outcome.mtu_bytes,
                        payload_bytes: outcome.payload_bytes,
                        iterations: outcome.iterations,
                    },
                    outcome.iterations as usize,
                ))
            }
            MetricKind::DnsResolution => {
                let timing = dns::time_domains(
                    self.dns.as_ref(),
                    &self.settings.dns_domains,
                    self.settings.dns_timeout,
                    &self.probe_logger,
                )
                .await?;
                Ok((
                    MetricValues::DnsResolution {
                        time_ms: timing.mean_ms,
                        min_ms: timing.min_ms,
                        max_ms: timing.max_ms,
                        domains: timing.domains,
                    },
                    timing.domains,
                ))
            }
            MetricKind::Bandwidth => {
                let measurement = self.bandwidth.measure().await?;
                let directions = [measurement.download_mbps, measurement.upload_mbps]
                    .iter()
                    .filter(|value| value.is_some())
                    .count();
                Ok((
                    MetricValues::Bandwidth {
                        download_mbps: measurement.download_mbps,
                        upload_mbps: measurement.upload_mbps,
                    },
                    directions,
                ))
            }
        }
    }

    /// A fresh probe stream for one probe metric
    async fn probe_stream(&self, target: &Target, sample_count: u32) -> Result<Vec<ProbeOutcome>> {
        ProbeStream::new(self.transport()?)
            .with_payload_size(self.settings.payload_size)
            .run(target, sample_count, self.settings.probe_interval, self.settings.probe_timeout)
            .await
    }

    fn transport(&self) -> Result<Arc<dyn ProbeTransport>> {
        self.transport
            .clone()
            .ok_or_else(|| AppError::transport("probe channel not open"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandwidth::BandwidthMeasurement;
    use crate::probe::SimulatedTransport;
    use crate::types::MetricStatus;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct InstantDns;

    #[async_trait]
    impl DnsTimer for InstantDns {
        async fn lookup(&self, _domain: &str) -> Result<Vec<IpAddr>> {
            tokio::time::sleep(Duration::from_millis(4)).await;
            Ok(vec![IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1))])
        }
    }

    /// Fails with a network error a fixed number of times, then succeeds
    struct FlakyBandwidth {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyBandwidth {
        fn new(failures: u32) -> Self {
            Self { failures, calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl BandwidthTester for FlakyBandwidth {
        async fn measure(&self) -> Result<BandwidthMeasurement> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AppError::network("connection reset"))
            } else {
                Ok(BandwidthMeasurement { download_mbps: Some(94.5), upload_mbps: None })
            }
        }
    }

    fn target() -> Target {
        Target::from_ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 50)))
    }

    fn orchestrator(settings: MeasurementSettings, transport: Arc<SimulatedTransport>) -> Orchestrator {
        Orchestrator::new(settings, Arc::new(InstantDns), Arc::new(FlakyBandwidth::new(0)))
            .with_transport(transport)
            .with_session_id("test-session")
    }

    fn fast_settings() -> MeasurementSettings {
        MeasurementSettings {
            probe_interval: Duration::from_millis(10),
            probe_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_canonical_order_and_dedup() {
        let transport = Arc::new(SimulatedTransport::new(Duration::from_millis(5)));
        let report = orchestrator(fast_settings(), transport)
            .run_all(&target(), &[MetricKind::Jitter, MetricKind::Latency, MetricKind::Jitter], 5)
            .await;

        assert_eq!(report.metric_names(), vec!["latency", "jitter"]);
        assert_eq!(report.session_id, "test-session");
        assert!(report.metrics.iter().all(MetricResult::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_metric_sends_nothing() {
        let transport = Arc::new(SimulatedTransport::new(Duration::from_millis(5)));
        let err = orchestrator(fast_settings(), transport.clone())
            .run_named(&target(), &["latency", "teleport"], 5)
            .await
            .unwrap_err();

        assert_eq!(err.category(), "VALIDATION");
        assert_eq!(transport.probes_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_loss_report() {
        let transport = Arc::new(SimulatedTransport::unreachable());
        let report = orchestrator(fast_settings(), transport)
            .run_named(&target(), &["latency", "packet_loss", "jitter"], 10)
            .await
            .unwrap();

        let loss = report.get(MetricKind::PacketLoss).unwrap();
        assert_eq!(
            loss.values,
            Some(MetricValues::PacketLoss { loss_rate_percent: 100.0, packets_sent: 10, packets_received: 0 })
        );

        let latency = report.get(MetricKind::Latency).unwrap();
        assert_eq!(latency.status, MetricStatus::Failed);
        assert!(latency.failure.as_deref().unwrap().contains("no successful probes"));
        assert_eq!(report.get(MetricKind::Jitter).unwrap().status, MetricStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metric_budget_times_out() {
        let settings = MeasurementSettings {
            probe_interval: Duration::from_millis(100),
            metric_timeout: Duration::from_secs(1),
            ..fast_settings()
        };
        let transport = Arc::new(SimulatedTransport::new(Duration::from_millis(5)));
        let report = orchestrator(settings, transport)
            .run_all(&target(), &[MetricKind::Latency], 100)
            .await;

        let latency = report.get(MetricKind::Latency).unwrap();
        assert_eq!(latency.status, MetricStatus::TimedOut);
        assert!(latency.values.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_overrun_is_not_retried() {
        let settings = MeasurementSettings {
            probe_interval: Duration::from_millis(100),
            metric_timeout: Duration::from_secs(1),
            max_attempts: 3,
            ..fast_settings()
        };
        let transport = Arc::new(SimulatedTransport::new(Duration::from_millis(5)));
        let started = Instant::now();
        let report = orchestrator(settings, transport.clone())
            .run_all(&target(), &[MetricKind::Latency], 100)
            .await;

        let latency = report.get(MetricKind::Latency).unwrap();
        assert_eq!(latency.status, MetricStatus::TimedOut);
        assert_eq!(latency.attempts, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert!(transport.probes_sent() <= 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_metrics_fail_without_transport() {
        let orchestrator = Orchestrator::new(fast_settings(), Arc::new(InstantDns), Arc::new(FlakyBandwidth::new(0)));
        let report = orchestrator
            .run_all(&target(), &[MetricKind::Latency, MetricKind::DnsResolution], 5)
            .await;

        let latency = report.get(MetricKind::Latency).unwrap();
        assert_eq!(latency.status, MetricStatus::Failed);
        assert!(latency.failure.as_deref().unwrap().contains("probe channel not open"));
        assert!(report.get(MetricKind::DnsResolution).unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recoverable_errors_are_retried() {
        let settings = MeasurementSettings { max_attempts: 3, ..fast_settings() };
        let bandwidth = Arc::new(FlakyBandwidth::new(2));
        let orchestrator = Orchestrator::new(settings, Arc::new(InstantDns), bandwidth.clone());

        let report = orchestrator.run_all(&target(), &[MetricKind::Bandwidth], 5).await;
        let result = report.get(MetricKind::Bandwidth).unwrap();

        assert!(result.is_success());
        assert_eq!(result.attempts, 3);
        assert_eq!(bandwidth.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_capped() {
        let bandwidth = Arc::new(FlakyBandwidth::new(5));
        let orchestrator = Orchestrator::new(
            MeasurementSettings { max_attempts: 2, ..fast_settings() },
            Arc::new(InstantDns),
            bandwidth.clone(),
        );

        let report = orchestrator.run_all(&target(), &[MetricKind::Bandwidth], 5).await;
        let result = report.get(MetricKind::Bandwidth).unwrap();

        assert_eq!(result.status, MetricStatus::Failed);
        assert_eq!(result.attempts, 2);
        assert_eq!(bandwidth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_keeps_canonical_order() {
        let settings = MeasurementSettings { parallel: true, ..fast_settings() };
        let transport = Arc::new(SimulatedTransport::new(Duration::from_millis(5)).with_mtu_limit(1400));
        let report = orchestrator(settings, transport)
            .run_all(&target(), &MetricKind::ALL, 5)
            .await;

        let names: Vec<&str> = MetricKind::ALL.iter().map(|m| m.name()).collect();
        assert_eq!(report.metric_names(), names);
        assert_eq!(report.successful_count(), MetricKind::ALL.len());

        match report.get(MetricKind::Mtu).unwrap().values {
            Some(MetricValues::Mtu { mtu_bytes, .. }) => assert_eq!(mtu_bytes, 1428),
            ref other => panic!("unexpected mtu values: {:?}", other),
        }
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            probe_interval_ms: 250,
            max_attempts: 3,
            parallel: true,
            ..Default::default()
        };
        let settings = MeasurementSettings::from(&config);

        assert_eq!(settings.probe_interval, Duration::from_millis(250));
        assert_eq!(settings.max_attempts, 3);
        assert!(settings.parallel);
        assert_eq!(settings.dns_domains, config.dns_domains);
    }
}
