//! JSON report artifact

use crate::{error::Result, models::RunReport};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Default report file name for a run started at `at`
pub fn default_report_name(at: DateTime<Local>) -> String {
    format!("network_test_report_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Writes the pretty-printed JSON report to disk
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    /// Write to `path`, or to a timestamped file in the working directory
    pub fn new(path: Option<&str>) -> Self {
        let path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(default_report_name(Local::now())),
        };
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(report: &RunReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    pub async fn write(&self, report: &RunReport) -> Result<&Path> {
        let json = Self::render(report)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricResult, MetricValues};
    use crate::types::{MetricKind, Target};
    use chrono::{TimeZone, Utc};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use tempfile::TempDir;

    fn report() -> RunReport {
        let metrics = vec![
            MetricResult::success(
                MetricKind::PacketLoss,
                MetricValues::PacketLoss { loss_rate_percent: 10.0, packets_sent: 10, packets_received: 9 },
                10,
                1,
                Duration::from_secs(1),
            ),
            MetricResult::failed(MetricKind::Bandwidth, "bandwidth test failed".to_string(), 0, 1, Duration::ZERO),
        ];
        RunReport::new("abc".to_string(), Target::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST)), 10, Utc::now(), metrics)
    }

    #[test]
    fn test_default_name() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(default_report_name(at), "network_test_report_20240309_140507.json");
    }

    #[tokio::test]
    async fn test_writes_pretty_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let writer = ReportWriter::new(path.to_str());

        let written = writer.write(&report()).await.unwrap();
        assert_eq!(written, path.as_path());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n  \"session_id\": \"abc\""));

        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(json["metrics"]["packet_loss"]["values"]["packets_received"], 9);
        assert!(json["metrics"]["bandwidth"]["values"].is_null());
        assert_eq!(json["metrics"]["bandwidth"]["failure"], "bandwidth test failed");
    }

    #[test]
    fn test_default_path_is_timestamped() {
        let writer = ReportWriter::new(None);
        let name = writer.path().to_string_lossy().to_string();
        let pattern = regex::Regex::new(r"^network_test_report_\d{8}_\d{6}\.json$").unwrap();
        assert!(pattern.is_match(&name), "unexpected report name {}", name);
    }
}
