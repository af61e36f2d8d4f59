use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;

pub use self::http::HttpSpeedProvider;

/// Failures at the measurement provider boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no speed test server available")]
    NoServers,

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("invalid {metric} measurement: {reason}")]
    InvalidMeasurement { metric: &'static str, reason: String },
}

/// The server a run measures against, as chosen by `select_server`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub label: String,
    pub download_url: String,
    pub upload_url: String,
    pub ping_url: String,
    /// Round-trip time observed during selection, if the provider probed it.
    pub latency_ms: Option<f64>,
}

/// Performs one throughput + latency measurement, one metric per call.
///
/// Implementations must bound every call by their configured timeout and
/// fail with [`ProviderError::Timeout`] rather than hang.
#[async_trait::async_trait]
pub trait MeasurementProvider: Send + Sync {
    /// Choose the server the remaining calls measure against.
    async fn select_server(&self) -> Result<ServerDescriptor, ProviderError>;

    /// Download throughput in raw bits per second.
    async fn measure_download(&self, server: &ServerDescriptor) -> Result<f64, ProviderError>;

    /// Upload throughput in raw bits per second.
    async fn measure_upload(&self, server: &ServerDescriptor) -> Result<f64, ProviderError>;

    /// Round-trip latency in milliseconds.
    async fn measure_ping(&self, server: &ServerDescriptor) -> Result<f64, ProviderError>;
}
