//! The speed test service: runner, history and access policy behind one
//! owned handle, exposing every role-gated operation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::access::{AccessDenied, AccessPolicy, Capability, Role, RoleProfile};
use crate::analysis::diagnostics::{DiagnosticsSummary, NetworkStatus};
use crate::storage::{HistoryRecord, HistoryStore};
use crate::throughput::provider::MeasurementProvider;
use crate::throughput::report::ShareableReport;
use crate::throughput::runner::{MeasurementRunner, RunOutcome, StartOutcome};
use crate::throughput::{MeasurementResult, RunPhase, RunState};

/// Default look-back for history queries.
pub const DEFAULT_HISTORY_DAYS: i64 = 7;

/// Longest accepted look-back; larger requests are clamped.
const MAX_HISTORY_DAYS: i64 = 36_500;

/// Most recent runs averaged by the diagnostics view.
pub const DIAGNOSTICS_WINDOW: usize = 10;

/// Most recent runs graded by the network-status view.
pub const STATUS_WINDOW: usize = 5;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Unauthorized(#[from] AccessDenied),

    #[error("no test results available")]
    NoResults,
}

/// Latest result as seen by the caller's role.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LatestView {
    Simple(SimpleLatest),
    Detailed(DetailedLatest),
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleLatest {
    pub download: Option<f64>,
    pub upload: Option<f64>,
    pub ping: Option<f64>,
    pub timestamp: Option<chrono::DateTime<Utc>>,
    pub testing: bool,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedLatest {
    #[serde(flatten)]
    pub simple: SimpleLatest,
    pub detailed: bool,
    pub phase: RunPhase,
    pub server_label: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub history: Vec<HistoryRecord>,
    pub total_tests: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportView {
    pub export_timestamp: chrono::DateTime<Utc>,
    pub user_role: Role,
    pub test_history: Vec<HistoryRecord>,
    pub latest_results: RunState,
    pub total_tests: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClearAck {
    pub removed: usize,
}

/// Lifecycle-scoped service handle. Clones share all state.
#[derive(Clone)]
pub struct SpeedService {
    runner: MeasurementRunner,
    policy: Arc<AccessPolicy>,
}

impl SpeedService {
    pub fn new(provider: Arc<dyn MeasurementProvider>) -> Self {
        Self {
            runner: MeasurementRunner::new(provider, HistoryStore::default()),
            policy: Arc::new(AccessPolicy::new()),
        }
    }

    fn require(&self, role: Role, capability: Capability) -> Result<(), ServiceError> {
        self.policy.require(role, capability).map_err(|denied| {
            warn!(%role, %capability, "access denied");
            ServiceError::from(denied)
        })
    }

    fn history_store(&self) -> &HistoryStore {
        self.runner.history()
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn roles(&self) -> Vec<RoleProfile> {
        self.policy.profiles()
    }

    /// Profile of the caller's own role. Needs no capability.
    pub fn role_profile(&self, role: Role) -> RoleProfile {
        role.profile()
    }

    /// Current run state, ungated. For local callers such as the CLI.
    pub fn run_state(&self) -> RunState {
        self.runner.snapshot()
    }

    /// Await the run most recently accepted by [`request_run`](Self::request_run).
    pub async fn wait_for_run(&self) -> Option<RunOutcome> {
        self.runner.join().await
    }

    pub async fn request_run(&self, role: Role) -> Result<StartOutcome, ServiceError> {
        self.require(role, Capability::BasicTest)?;
        Ok(self.runner.start(role).await)
    }

    pub fn latest(&self, role: Role) -> Result<LatestView, ServiceError> {
        let detailed = self.policy.authorize(role, Capability::DetailedResults);
        if !detailed {
            self.require(role, Capability::SimpleResults)?;
        }

        let state = self.runner.snapshot();
        let result = state.latest_result.as_ref();
        let simple = SimpleLatest {
            download: result.map(|r| r.download_mbps),
            upload: result.map(|r| r.upload_mbps),
            ping: result.map(|r| r.ping_ms),
            timestamp: result.map(|r| r.completed_at),
            testing: state.testing,
            status: state.status.clone(),
        };

        if !detailed {
            return Ok(LatestView::Simple(simple));
        }
        Ok(LatestView::Detailed(DetailedLatest {
            simple,
            detailed: true,
            phase: state.phase,
            server_label: result.map(|r| r.server_label.clone()),
            last_error: state.last_error,
        }))
    }

    pub async fn history(&self, role: Role, days: i64) -> Result<HistoryView, ServiceError> {
        self.require(role, Capability::History)?;
        let since = Utc::now() - Duration::days(days.clamp(0, MAX_HISTORY_DAYS));
        let history = self.history_store().window(since).await;
        Ok(HistoryView {
            total_tests: history.len(),
            history,
        })
    }

    pub async fn diagnostics(&self, role: Role) -> Result<DiagnosticsSummary, ServiceError> {
        self.require(role, Capability::Diagnostics)?;
        let all = self.history_store().export().await;
        let recent = self.history_store().tail(DIAGNOSTICS_WINDOW).await;
        Ok(DiagnosticsSummary::build(&all, &recent, Utc::now()))
    }

    pub fn generate_report(&self, role: Role) -> Result<ShareableReport, ServiceError> {
        self.require(role, Capability::ReportSharing)?;
        let latest: MeasurementResult = self
            .runner
            .snapshot()
            .latest_result
            .ok_or(ServiceError::NoResults)?;
        let report = ShareableReport::from_result(&latest, Utc::now());
        info!(%role, report_id = %report.report_id, "report generated");
        Ok(report)
    }

    pub async fn clear_history(&self, role: Role) -> Result<ClearAck, ServiceError> {
        self.require(role, Capability::ClearHistory)?;
        let removed = self.history_store().clear().await;
        info!(%role, removed, "history cleared");
        Ok(ClearAck { removed })
    }

    pub async fn export(&self, role: Role) -> Result<ExportView, ServiceError> {
        self.require(role, Capability::History)?;
        let test_history = self.history_store().export().await;
        Ok(ExportView {
            export_timestamp: Utc::now(),
            user_role: role,
            total_tests: test_history.len(),
            test_history,
            latest_results: self.runner.snapshot(),
        })
    }

    pub async fn network_status(&self, role: Role) -> Result<NetworkStatus, ServiceError> {
        self.require(role, Capability::History)?;
        let total = self.history_store().len().await;
        let recent = self.history_store().tail(STATUS_WINDOW).await;
        Ok(NetworkStatus::build(&recent, total, Utc::now()))
    }
}
