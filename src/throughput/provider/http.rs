//! HTTP speed test provider: timed downloads, uploads and round trips
//! against configured speed test endpoints.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future::join_all;
use reqwest::{Client, Response};
use tracing::debug;

use super::{MeasurementProvider, ProviderError, ServerDescriptor};
use crate::config::{ProviderConfig, ServerEndpoint};

/// Placeholder in `download_url` replaced by the configured transfer size.
const BYTES_PLACEHOLDER: &str = "{bytes}";

pub struct HttpSpeedProvider {
    client: Client,
    servers: Vec<ServerEndpoint>,
    timeout: Duration,
    download_bytes: u64,
    upload_bytes: usize,
    ping_samples: usize,
}

impl HttpSpeedProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            servers: config.servers.clone(),
            timeout,
            download_bytes: config.download_bytes,
            upload_bytes: config.upload_bytes,
            ping_samples: config.ping_samples.max(1),
        })
    }

    /// Run `fut` under the provider timeout.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                operation,
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Time-to-response of a GET against `url`, in milliseconds.
    async fn round_trip(&self, url: &str) -> Result<f64, ProviderError> {
        let start = Instant::now();
        let response = self.client.get(url).send().await.map_err(|source| {
            ProviderError::Request {
                url: url.to_string(),
                source,
            }
        })?;
        check_status(url, &response)?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }

    fn describe(&self, endpoint: &ServerEndpoint, latency_ms: f64) -> ServerDescriptor {
        ServerDescriptor {
            label: endpoint.label.clone(),
            download_url: endpoint
                .download_url
                .replace(BYTES_PLACEHOLDER, &self.download_bytes.to_string()),
            upload_url: endpoint.upload_url.clone(),
            ping_url: endpoint.ping_url.clone(),
            latency_ms: Some(latency_ms),
        }
    }
}

fn check_status(url: &str, response: &Response) -> Result<(), ProviderError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(ProviderError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}

/// Bits per second for `bytes` moved in `elapsed`.
fn bits_per_second(metric: &'static str, bytes: u64, elapsed: Duration) -> Result<f64, ProviderError> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return Err(ProviderError::InvalidMeasurement {
            metric,
            reason: "transfer completed in zero time".to_string(),
        });
    }
    Ok(bytes as f64 * 8.0 / secs)
}

fn median(mut samples: Vec<f64>) -> f64 {
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        (samples[mid - 1] + samples[mid]) / 2.0
    } else {
        samples[mid]
    }
}

#[async_trait::async_trait]
impl MeasurementProvider for HttpSpeedProvider {
    async fn select_server(&self) -> Result<ServerDescriptor, ProviderError> {
        if self.servers.is_empty() {
            return Err(ProviderError::NoServers);
        }

        let probes = self.servers.iter().map(|endpoint| async move {
            (endpoint, self.round_trip(&endpoint.ping_url).await)
        });
        let results = self
            .bounded("server selection", async { Ok(join_all(probes).await) })
            .await?;

        let (endpoint, latency_ms) = results
            .into_iter()
            .filter_map(|(endpoint, outcome)| match outcome {
                Ok(ms) => Some((endpoint, ms)),
                Err(e) => {
                    debug!(server = %endpoint.label, error = %e, "server probe failed");
                    None
                }
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or(ProviderError::NoServers)?;

        debug!(server = %endpoint.label, latency_ms, "selected server");
        Ok(self.describe(endpoint, latency_ms))
    }

    async fn measure_download(&self, server: &ServerDescriptor) -> Result<f64, ProviderError> {
        self.bounded("download", async {
            let url = server.download_url.as_str();
            let request_error = |source| ProviderError::Request {
                url: url.to_string(),
                source,
            };

            let start = Instant::now();
            let mut response = self.client.get(url).send().await.map_err(request_error)?;
            check_status(url, &response)?;

            let mut received: u64 = 0;
            while let Some(chunk) = response.chunk().await.map_err(request_error)? {
                received += chunk.len() as u64;
            }
            bits_per_second("download", received, start.elapsed())
        })
        .await
    }

    async fn measure_upload(&self, server: &ServerDescriptor) -> Result<f64, ProviderError> {
        self.bounded("upload", async {
            let url = server.upload_url.as_str();
            let payload = Bytes::from(vec![0u8; self.upload_bytes]);

            let start = Instant::now();
            let response = self
                .client
                .post(url)
                .body(payload)
                .send()
                .await
                .map_err(|source| ProviderError::Request {
                    url: url.to_string(),
                    source,
                })?;
            check_status(url, &response)?;
            bits_per_second("upload", self.upload_bytes as u64, start.elapsed())
        })
        .await
    }

    async fn measure_ping(&self, server: &ServerDescriptor) -> Result<f64, ProviderError> {
        self.bounded("ping", async {
            let mut samples = Vec::with_capacity(self.ping_samples);
            for _ in 0..self.ping_samples {
                samples.push(self.round_trip(&server.ping_url).await?);
            }
            Ok(median(samples))
        })
        .await
    }
}
