//! Pure aggregations over history snapshots: averages, health grades and
//! daily counts.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::storage::HistoryRecord;
use crate::throughput::round2;

/// Download above this (Mbps) is Good.
pub const DOWNLOAD_GOOD_MBPS: f64 = 25.0;
/// Download above this (Mbps) is Fair.
pub const DOWNLOAD_FAIR_MBPS: f64 = 10.0;
/// Upload above this (Mbps) is Good.
pub const UPLOAD_GOOD_MBPS: f64 = 5.0;
/// Upload above this (Mbps) is Fair.
pub const UPLOAD_FAIR_MBPS: f64 = 2.0;
/// Ping below this (ms) is Good.
pub const PING_GOOD_MS: f64 = 50.0;
/// Ping below this (ms) is Fair.
pub const PING_FAIR_MS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Averages {
    pub avg_download: f64,
    pub avg_upload: f64,
    pub avg_ping: f64,
}

impl Averages {
    pub fn rounded(self) -> Self {
        Self {
            avg_download: round2(self.avg_download),
            avg_upload: round2(self.avg_upload),
            avg_ping: round2(self.avg_ping),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Health {
    Good,
    Fair,
    Poor,
    #[serde(rename = "No Data")]
    NoData,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Health::Good => "Good",
            Health::Fair => "Fair",
            Health::Poor => "Poor",
            Health::NoData => "No Data",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthClassification {
    pub download_health: Health,
    pub upload_health: Health,
    pub ping_health: Health,
    pub overall_health: Health,
}

impl HealthClassification {
    pub const NO_DATA: Self = Self {
        download_health: Health::NoData,
        upload_health: Health::NoData,
        ping_health: Health::NoData,
        overall_health: Health::NoData,
    };
}

/// Arithmetic mean of each metric; all zero for an empty slice.
pub fn averages(records: &[HistoryRecord]) -> Averages {
    if records.is_empty() {
        return Averages::default();
    }
    let n = records.len() as f64;
    let (download, upload, ping) = records.iter().fold((0.0, 0.0, 0.0), |acc, r| {
        (
            acc.0 + r.result.download_mbps,
            acc.1 + r.result.upload_mbps,
            acc.2 + r.result.ping_ms,
        )
    });
    Averages {
        avg_download: download / n,
        avg_upload: upload / n,
        avg_ping: ping / n,
    }
}

fn higher_is_better(value: f64, good: f64, fair: f64) -> Health {
    if value > good {
        Health::Good
    } else if value > fair {
        Health::Fair
    } else {
        Health::Poor
    }
}

fn lower_is_better(value: f64, good: f64, fair: f64) -> Health {
    if value < good {
        Health::Good
    } else if value < fair {
        Health::Fair
    } else {
        Health::Poor
    }
}

/// Grade averaged metrics against the fixed thresholds.
///
/// Overall is Good only when every metric is Good and Fair otherwise; it
/// never reports Poor.
pub fn health_classification(avg_download: f64, avg_upload: f64, avg_ping: f64) -> HealthClassification {
    let download_health = higher_is_better(avg_download, DOWNLOAD_GOOD_MBPS, DOWNLOAD_FAIR_MBPS);
    let upload_health = higher_is_better(avg_upload, UPLOAD_GOOD_MBPS, UPLOAD_FAIR_MBPS);
    let ping_health = lower_is_better(avg_ping, PING_GOOD_MS, PING_FAIR_MS);

    let all_good = [download_health, upload_health, ping_health]
        .iter()
        .all(|h| *h == Health::Good);

    HealthClassification {
        download_health,
        upload_health,
        ping_health,
        overall_health: if all_good { Health::Good } else { Health::Fair },
    }
}

/// Classify a record window, reporting No Data when it is empty.
pub fn classify_records(records: &[HistoryRecord]) -> HealthClassification {
    if records.is_empty() {
        return HealthClassification::NO_DATA;
    }
    let avg = averages(records);
    health_classification(avg.avg_download, avg.avg_upload, avg.avg_ping)
}

/// Records completed on `today`'s calendar date (UTC).
pub fn tests_today_count(records: &[HistoryRecord], today: NaiveDate) -> usize {
    records
        .iter()
        .filter(|r| r.result.completed_at.date_naive() == today)
        .count()
}

/// Averages over recent runs plus today's run count.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSummary {
    pub generated_at: DateTime<Utc>,
    pub tests_today: usize,
    pub avg_download: f64,
    pub avg_upload: f64,
    pub avg_ping: f64,
}

impl DiagnosticsSummary {
    /// `all` is the full history (for the daily count); `recent` its averaging window.
    pub fn build(all: &[HistoryRecord], recent: &[HistoryRecord], now: DateTime<Utc>) -> Self {
        let avg = averages(recent).rounded();
        Self {
            generated_at: now,
            tests_today: tests_today_count(all, now.date_naive()),
            avg_download: avg.avg_download,
            avg_upload: avg.avg_upload,
            avg_ping: avg.avg_ping,
        }
    }
}

/// Health overview over the most recent runs.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatus {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub health: HealthClassification,
    pub recent_avg_download: f64,
    pub recent_avg_upload: f64,
    pub recent_avg_ping: f64,
    pub total_tests_count: usize,
}

impl NetworkStatus {
    pub fn build(recent: &[HistoryRecord], total_tests_count: usize, now: DateTime<Utc>) -> Self {
        let avg = averages(recent).rounded();
        Self {
            timestamp: now,
            health: classify_records(recent),
            recent_avg_download: avg.avg_download,
            recent_avg_upload: avg.avg_upload,
            recent_avg_ping: avg.avg_ping,
            total_tests_count,
        }
    }
}
