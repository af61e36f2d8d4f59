//! Throughput testing: measurement results, run state, and the background runner.

pub mod provider;
pub mod report;
pub mod runner;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use self::provider::ProviderError;

/// Bits per megabit, used to normalize provider output.
const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert raw bits-per-second into megabits-per-second, rounded to 2 places.
pub fn bps_to_mbps(bits_per_second: f64) -> f64 {
    round2(bits_per_second / BITS_PER_MEGABIT)
}

/// Reject negative or non-finite provider readings.
pub(crate) fn checked_reading(metric: &'static str, value: f64) -> Result<f64, ProviderError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ProviderError::InvalidMeasurement {
            metric,
            reason: format!("provider returned {}", value),
        })
    }
}

/// A completed speed test. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub server_label: String,
    pub completed_at: DateTime<Utc>,
}

/// Phase of the single process-wide measurement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    SelectingServer,
    MeasuringDownload,
    MeasuringUpload,
    MeasuringPing,
    Complete,
    Failed,
}

impl RunPhase {
    /// True while a background run owns the state machine.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunPhase::SelectingServer
                | RunPhase::MeasuringDownload
                | RunPhase::MeasuringUpload
                | RunPhase::MeasuringPing
        )
    }

    /// Progress text shown to pollers while in this phase.
    pub fn status_text(self) -> &'static str {
        match self {
            RunPhase::Idle => "Ready",
            RunPhase::SelectingServer => "Finding best server...",
            RunPhase::MeasuringDownload => "Testing download speed...",
            RunPhase::MeasuringUpload => "Testing upload speed...",
            RunPhase::MeasuringPing => "Measuring ping...",
            RunPhase::Complete => "Complete",
            RunPhase::Failed => "Failed",
        }
    }
}

/// Point-in-time copy of the measurement state machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    pub phase: RunPhase,
    pub status: String,
    pub last_error: Option<String>,
    pub latest_result: Option<MeasurementResult>,
    pub testing: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            status: RunPhase::Idle.status_text().to_string(),
            last_error: None,
            latest_result: None,
            testing: false,
        }
    }
}

impl RunState {
    /// Move to `phase`, keeping `status` and `testing` in step with it.
    pub(crate) fn enter(&mut self, phase: RunPhase) {
        self.phase = phase;
        self.status = phase.status_text().to_string();
        self.testing = phase.is_active();
    }

    /// Terminal failure. The previous `latest_result` is left untouched.
    pub(crate) fn fail(&mut self, message: String) {
        self.enter(RunPhase::Failed);
        self.status = format!("Error: {}", message);
        self.last_error = Some(message);
    }

    /// Terminal success, publishing `result` in the same write as the phase.
    pub(crate) fn complete(&mut self, result: MeasurementResult) {
        self.enter(RunPhase::Complete);
        self.last_error = None;
        self.latest_result = Some(result);
    }
}
