//! Shareable report artifacts built from a completed measurement.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::MeasurementResult;

/// The measured values embedded in a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedResults {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub server_label: String,
    pub test_timestamp: DateTime<Utc>,
}

/// A report support staff can hand to a customer or attach to a ticket.
#[derive(Debug, Clone, Serialize)]
pub struct ShareableReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub test_results: ReportedResults,
    pub summary: String,
}

impl ShareableReport {
    pub fn from_result(result: &MeasurementResult, generated_at: DateTime<Utc>) -> Self {
        Self {
            report_id: format!("REPORT_{}", Uuid::new_v4().simple()),
            generated_at,
            test_results: ReportedResults {
                download_mbps: result.download_mbps,
                upload_mbps: result.upload_mbps,
                ping_ms: result.ping_ms,
                server_label: result.server_label.clone(),
                test_timestamp: result.completed_at,
            },
            summary: format_summary(result),
        }
    }
}

/// One-line human-readable summary of a result. Whole values keep their
/// trailing `.0`.
pub fn format_summary(result: &MeasurementResult) -> String {
    format!(
        "Customer speed test results: {:?} Mbps down, {:?} Mbps up, {:?} ms ping",
        result.download_mbps, result.upload_mbps, result.ping_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MeasurementResult {
        MeasurementResult {
            download_mbps: 94.12,
            upload_mbps: 11.5,
            ping_ms: 18.25,
            server_label: "edge-fra".to_string(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_summary() {
        assert_eq!(
            format_summary(&sample()),
            "Customer speed test results: 94.12 Mbps down, 11.5 Mbps up, 18.25 ms ping"
        );
    }

    #[test]
    fn test_format_summary_keeps_decimal_point() {
        let mut result = sample();
        result.download_mbps = 100.0;
        result.upload_mbps = 10.0;
        result.ping_ms = 20.0;
        assert_eq!(
            format_summary(&result),
            "Customer speed test results: 100.0 Mbps down, 10.0 Mbps up, 20.0 ms ping"
        );
    }

    #[test]
    fn test_report_embeds_result() {
        let result = sample();
        let report = ShareableReport::from_result(&result, Utc::now());
        assert!(report.report_id.starts_with("REPORT_"));
        assert_eq!(report.test_results.download_mbps, 94.12);
        assert_eq!(report.test_results.server_label, "edge-fra");
        assert_eq!(report.test_results.test_timestamp, result.completed_at);
        assert!(report.summary.contains("94.12 Mbps down"));
    }

    #[test]
    fn test_report_ids_are_unique() {
        let result = sample();
        let now = Utc::now();
        let a = ShareableReport::from_result(&result, now);
        let b = ShareableReport::from_result(&result, now);
        assert_ne!(a.report_id, b.report_id);
    }
}
