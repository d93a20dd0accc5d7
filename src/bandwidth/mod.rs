//! Bandwidth measurement against a Cloudflare-compatible speed-test endpoint
//!
//! `GET {base}/__down?bytes=N` streams N bytes back; `POST {base}/__up`
//! accepts an arbitrary body.

use crate::{
    error::{AppError, Result},
    logging::ProbeLogger,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use url::Url;

/// Throughput in megabits per second; a direction is `None` when its
/// transfer failed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandwidthMeasurement {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
}

/// Measures bandwidth toward some endpoint, with its own internal timeout
#[async_trait]
pub trait BandwidthTester: Send + Sync {
    /// Measure download and upload independently. Fails only when neither
    /// direction produced a value.
    async fn measure(&self) -> Result<BandwidthMeasurement>;
}

/// HTTP speed-test client built on reqwest
pub struct SpeedTestClient {
    client: Client,
    base_url: Url,
    download_bytes: u64,
    upload_bytes: u64,
    logger: ProbeLogger,
}

impl SpeedTestClient {
    pub fn new(
        base_url: &str,
        download_bytes: u64,
        upload_bytes: u64,
        timeout: Duration,
        logger: ProbeLogger,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
            .build()?;

        Ok(Self {
            client,
            base_url,
            download_bytes,
            upload_bytes,
            logger,
        })
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        Ok(self.base_url.join(name)?)
    }

    async fn download(&self) -> Result<f64> {
        let mut url = self.endpoint("__down")?;
        url.query_pairs_mut().append_pair("bytes", &self.download_bytes.to_string());

        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::http_request(format!(
                "download failed with status: {}",
                response.status()
            )));
        }

        let mut bytes_received: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes_received += chunk?.len() as u64;
        }

        if bytes_received == 0 {
            return Err(AppError::measurement("download returned no data"));
        }
        throughput_mbps(bytes_received, start.elapsed())
    }

    async fn upload(&self) -> Result<f64> {
        let url = self.endpoint("__up")?;
        let body: Vec<u8> = (0..self.upload_bytes).map(|i| (i % 256) as u8).collect();

        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .body(body)
            .send()
            .await?;
        let elapsed = start.elapsed();

        if !response.status().is_success() {
            return Err(AppError::http_request(format!(
                "upload failed with status: {}",
                response.status()
            )));
        }

        throughput_mbps(self.upload_bytes, elapsed)
    }
}

#[async_trait]
impl BandwidthTester for SpeedTestClient {
    async fn measure(&self) -> Result<BandwidthMeasurement> {
        let download = self.download().await;
        self.logger.log_transfer("Download", download.as_ref().copied()).await;

        let upload = self.upload().await;
        self.logger.log_transfer("Upload", upload.as_ref().copied()).await;

        match (download, upload) {
            (Err(down), Err(up)) => Err(AppError::network(format!(
                "bandwidth test failed: download: {}; upload: {}",
                down, up
            ))),
            (download, upload) => Ok(BandwidthMeasurement {
                download_mbps: download.ok(),
                upload_mbps: upload.ok(),
            }),
        }
    }
}

/// Megabits per second for `bytes` moved in `elapsed`
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> Result<f64> {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return Err(AppError::measurement("transfer completed too fast to measure"));
    }
    Ok(bytes as f64 * 8.0 / (seconds * 1_000_000.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Logger;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> SpeedTestClient {
        SpeedTestClient::new(base, 64_000, 32_000, Duration::from_secs(5), ProbeLogger::new(Logger::silent())).unwrap()
    }

    #[test]
    fn test_throughput_math() {
        assert_eq!(throughput_mbps(1_000_000, Duration::from_secs(1)).unwrap(), 8.0);
        assert_eq!(throughput_mbps(250_000, Duration::from_millis(500)).unwrap(), 4.0);
        assert!(throughput_mbps(1, Duration::ZERO).is_err());
    }

    #[test]
    fn test_endpoint_join_keeps_base_path() {
        let nested = client("https://example.com/speed");
        assert_eq!(nested.endpoint("__down").unwrap().as_str(), "https://example.com/speed/__down");

        let root = client("https://example.com");
        assert_eq!(root.endpoint("__up").unwrap().as_str(), "https://example.com/__up");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = SpeedTestClient::new("not a url", 1, 1, Duration::from_secs(1), ProbeLogger::new(Logger::silent()));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_measures_both_directions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/__down"))
            .and(query_param("bytes", "64000"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64_000]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/__up"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let measurement = client(&server.uri()).measure().await.unwrap();
        assert!(measurement.download_mbps.unwrap() > 0.0);
        assert!(measurement.upload_mbps.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_one_direction_failing_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/__down"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64_000]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/__up"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let measurement = client(&server.uri()).measure().await.unwrap();
        assert!(measurement.download_mbps.is_some());
        assert!(measurement.upload_mbps.is_none());
    }

    #[tokio::test]
    async fn test_both_directions_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server.uri()).measure().await.unwrap_err();
        assert_eq!(err.category(), "NETWORK");
        assert!(err.to_string().contains("download"));
        assert!(err.to_string().contains("upload"));
    }
}
