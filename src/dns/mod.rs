//! DNS resolution: target lookup and resolution timing

use crate::{
    error::{AppError, Result},
    logging::ProbeLogger,
    types::Target,
};
use async_trait::async_trait;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;
use trust_dns_resolver::{
    config::{ResolverConfig, ResolverOpts},
    system_conf, TokioAsyncResolver,
};

/// Resolves host names and times how long resolution takes
#[async_trait]
pub trait DnsTimer: Send + Sync {
    /// Resolve `domain` to its addresses
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>>;

    /// Wall time of one complete lookup of `domain`, bounded by `timeout`
    async fn time_resolution(&self, domain: &str, timeout: Duration) -> Result<Duration> {
        let start = Instant::now();
        match tokio::time::timeout(timeout, self.lookup(domain)).await {
            Ok(Ok(_)) => Ok(start.elapsed()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AppError::timeout(format!(
                "DNS lookup for {} exceeded {}ms",
                domain,
                timeout.as_millis()
            ))),
        }
    }
}

/// DNS timer backed by the system resolver configuration
pub struct SystemDnsTimer {
    resolver: TokioAsyncResolver,
}

impl SystemDnsTimer {
    /// Build a resolver from the system configuration, falling back to the
    /// library defaults when it cannot be read. The answer cache is disabled
    /// so every timed lookup reaches a name server.
    pub fn new() -> Self {
        let (config, mut opts) = system_conf::read_system_conf()
            .unwrap_or_else(|_| (ResolverConfig::default(), ResolverOpts::default()));
        opts.cache_size = 0;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl Default for SystemDnsTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsTimer for SystemDnsTimer {
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>> {
        let response = self
            .resolver
            .lookup_ip(domain)
            .await
            .map_err(|e| AppError::dns_resolution(format!("DNS lookup failed for {}: {}", domain, e)))?;

        let ips: Vec<IpAddr> = response.iter().collect();
        if ips.is_empty() {
            return Err(AppError::dns_resolution(format!("No IP addresses resolved for {}", domain)));
        }
        Ok(ips)
    }
}

/// Resolve the run target once. A literal IP address skips DNS entirely;
/// otherwise the first address returned is used.
pub async fn resolve_target(input: &str, dns: &dyn DnsTimer) -> Result<Target> {
    let input = input.trim();
    let literal = input.trim_start_matches('[').trim_end_matches(']');
    if let Ok(address) = literal.parse::<IpAddr>() {
        return Ok(Target::new(input, address));
    }

    let address = dns
        .lookup(input)
        .await
        .map_err(|e| AppError::dns_resolution(format!("cannot resolve target '{}': {}", input, e)))?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::dns_resolution(format!("no addresses found for target '{}'", input)))?;

    Ok(Target::new(input, address))
}

/// Resolution times over a set of domains
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsTiming {
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Domains that resolved
    pub domains: usize,
    /// Domains that failed, with the reason
    pub failures: Vec<(String, String)>,
}

/// Time one lookup of each domain in turn.
///
/// A failing domain is logged and skipped; the timing fails only when no
/// domain resolved at all.
pub async fn time_domains(
    dns: &dyn DnsTimer,
    domains: &[String],
    timeout: Duration,
    logger: &ProbeLogger,
) -> Result<DnsTiming> {
    if domains.is_empty() {
        return Err(AppError::validation("no domains configured for DNS timing"));
    }

    let mut times = Vec::with_capacity(domains.len());
    let mut failures = Vec::new();

    for domain in domains {
        match dns.time_resolution(domain, timeout).await {
            Ok(elapsed) => {
                logger.log_dns_lookup(domain, Ok(elapsed)).await;
                times.push(elapsed.as_secs_f64() * 1000.0);
            }
            Err(e) => {
                logger.log_dns_lookup(domain, Err(&e)).await;
                failures.push((domain.clone(), e.to_string()));
            }
        }
    }

    if times.is_empty() {
        let reasons = failures.iter().map(|(_, reason)| reason.as_str()).collect::<Vec<_>>().join("; ");
        return Err(AppError::dns_resolution(format!("no domain resolved: {}", reasons)));
    }

    Ok(DnsTiming {
        mean_ms: times.iter().sum::<f64>() / times.len() as f64,
        min_ms: times.iter().copied().fold(f64::INFINITY, f64::min),
        max_ms: times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        domains: times.len(),
        failures,
    })
}
