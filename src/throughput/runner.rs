//! Single-flight background measurement runner.
//!
//! The whole run state lives in a `watch` channel: every write replaces or
//! edits it under the channel lock, so readers always clone a consistent
//! value. The phase itself is the busy flag; moving into `SelectingServer`
//! is a compare-and-set under that lock.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::provider::{MeasurementProvider, ProviderError};
use super::{bps_to_mbps, checked_reading, round2, MeasurementResult, RunPhase, RunState};
use crate::access::Role;
use crate::storage::{HistoryRecord, HistoryStore};

/// Message recorded when a run's task ends without reaching a terminal phase.
const ABORTED_MESSAGE: &str = "measurement aborted before completion";

/// Answer to a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// How a background run ended, as observed by its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(MeasurementResult),
    Failed(String),
    /// The task panicked or was cancelled before finishing.
    Aborted,
}

struct RunnerInner {
    provider: Arc<dyn MeasurementProvider>,
    history: HistoryStore,
    state: watch::Sender<RunState>,
    task: Mutex<Option<JoinHandle<RunOutcome>>>,
}

/// Owns the process-wide run state machine. Clones share the same state.
#[derive(Clone)]
pub struct MeasurementRunner {
    inner: Arc<RunnerInner>,
}

/// Moves an unfinished run to `Failed` when dropped, releasing the slot on
/// every exit path of the background task, including unwinding.
struct ActiveRunGuard {
    inner: Arc<RunnerInner>,
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        let released = self.inner.state.send_if_modified(|state| {
            if state.phase.is_active() {
                state.fail(ABORTED_MESSAGE.to_string());
                true
            } else {
                false
            }
        });
        if released {
            error!("measurement run ended without a result; marked as failed");
        }
    }
}

impl MeasurementRunner {
    pub fn new(provider: Arc<dyn MeasurementProvider>, history: HistoryStore) -> Self {
        let (state, _) = watch::channel(RunState::default());
        Self {
            inner: Arc::new(RunnerInner {
                provider,
                history,
                state,
                task: Mutex::new(None),
            }),
        }
    }

    /// Start a run on behalf of `role` unless one is already active.
    ///
    /// Returns immediately; the measurement proceeds on a spawned task.
    pub async fn start(&self, role: Role) -> StartOutcome {
        // Held across claim and spawn so the stored handle always belongs
        // to the most recently claimed run.
        let mut task = self.inner.task.lock().await;
        let claimed = self.inner.state.send_if_modified(|state| {
            if state.phase.is_active() {
                return false;
            }
            state.enter(RunPhase::SelectingServer);
            state.last_error = None;
            true
        });
        if !claimed {
            debug!(%role, "measurement already running");
            return StartOutcome::AlreadyRunning;
        }

        info!(%role, "measurement started");
        let guard = ActiveRunGuard {
            inner: self.inner.clone(),
        };
        let handle = tokio::spawn(async move {
            let guard = guard;
            guard.inner.execute(role).await
        });
        *task = Some(handle);
        StartOutcome::Started
    }

    /// Consistent copy of the current run state.
    pub fn snapshot(&self) -> RunState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every phase change.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.inner.state.subscribe()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.inner.history
    }

    /// Wait for the most recently started run to finish.
    ///
    /// Returns `None` when no run has been started since the last join.
    pub async fn join(&self) -> Option<RunOutcome> {
        let handle = self.inner.task.lock().await.take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "measurement task did not finish");
                Some(RunOutcome::Aborted)
            }
        }
    }
}

impl RunnerInner {
    fn set_phase(&self, phase: RunPhase) {
        self.state.send_modify(|state| state.enter(phase));
        debug!(?phase, "measurement phase");
    }

    async fn execute(&self, role: Role) -> RunOutcome {
        match self.measure().await {
            Ok(result) => {
                self.history
                    .append(HistoryRecord {
                        result: result.clone(),
                        role_of_requester: role,
                    })
                    .await;
                self.state.send_modify(|state| state.complete(result.clone()));
                info!(
                    %role,
                    download_mbps = result.download_mbps,
                    upload_mbps = result.upload_mbps,
                    ping_ms = result.ping_ms,
                    server = %result.server_label,
                    "measurement complete"
                );
                RunOutcome::Completed(result)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(%role, error = %message, "measurement failed");
                self.state.send_modify(|state| state.fail(message.clone()));
                RunOutcome::Failed(message)
            }
        }
    }

    async fn measure(&self) -> Result<MeasurementResult, ProviderError> {
        let server = self.provider.select_server().await?;

        self.set_phase(RunPhase::MeasuringDownload);
        let download = checked_reading("download", self.provider.measure_download(&server).await?)?;

        self.set_phase(RunPhase::MeasuringUpload);
        let upload = checked_reading("upload", self.provider.measure_upload(&server).await?)?;

        self.set_phase(RunPhase::MeasuringPing);
        let ping = checked_reading("ping", self.provider.measure_ping(&server).await?)?;

        Ok(MeasurementResult {
            download_mbps: bps_to_mbps(download),
            upload_mbps: bps_to_mbps(upload),
            ping_ms: round2(ping),
            server_label: server.label,
            completed_at: Utc::now(),
        })
    }
}
