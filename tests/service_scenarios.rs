//! End-to-end scenarios against the service with a scripted provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use speedwatch::access::Role;
use speedwatch::service::{LatestView, ServiceError, SpeedService};
use speedwatch::throughput::provider::{MeasurementProvider, ProviderError, ServerDescriptor};
use speedwatch::throughput::runner::{RunOutcome, StartOutcome};
use speedwatch::throughput::RunPhase;
use tokio::sync::Notify;

/// Plays back queued download readings; the other metrics are fixed.
struct QueuedProvider {
    downloads: Mutex<VecDeque<Result<f64, String>>>,
    upload_bps: f64,
    ping_ms: f64,
    gate: Option<Arc<Notify>>,
}

impl QueuedProvider {
    fn new(downloads: Vec<Result<f64, String>>, upload_bps: f64, ping_ms: f64) -> Self {
        Self {
            downloads: Mutex::new(downloads.into()),
            upload_bps,
            ping_ms,
            gate: None,
        }
    }
}

#[async_trait::async_trait]
impl MeasurementProvider for QueuedProvider {
    async fn select_server(&self) -> Result<ServerDescriptor, ProviderError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(ServerDescriptor {
            label: "queued".to_string(),
            download_url: String::new(),
            upload_url: String::new(),
            ping_url: String::new(),
            latency_ms: None,
        })
    }

    async fn measure_download(&self, _: &ServerDescriptor) -> Result<f64, ProviderError> {
        let next = self.downloads.lock().unwrap().pop_front();
        match next {
            Some(Ok(bps)) => Ok(bps),
            Some(Err(reason)) => Err(ProviderError::InvalidMeasurement {
                metric: "download",
                reason,
            }),
            None => Err(ProviderError::NoServers),
        }
    }

    async fn measure_upload(&self, _: &ServerDescriptor) -> Result<f64, ProviderError> {
        Ok(self.upload_bps)
    }

    async fn measure_ping(&self, _: &ServerDescriptor) -> Result<f64, ProviderError> {
        Ok(self.ping_ms)
    }
}

fn service_with(provider: QueuedProvider) -> SpeedService {
    SpeedService::new(Arc::new(provider))
}

async fn run_once(service: &SpeedService, role: Role) -> RunOutcome {
    assert_eq!(service.request_run(role).await.unwrap(), StartOutcome::Started);
    service.wait_for_run().await.unwrap()
}

#[tokio::test]
async fn test_home_user_run_reports_converted_metrics() {
    let service = service_with(QueuedProvider::new(
        vec![Ok(100_000_000.0)],
        10_000_000.0,
        20.456,
    ));

    run_once(&service, Role::HomeUser).await;

    match service.latest(Role::HomeUser).unwrap() {
        LatestView::Simple(view) => {
            assert_eq!(view.download, Some(100.0));
            assert_eq!(view.upload, Some(10.0));
            assert_eq!(view.ping, Some(20.46));
        }
        other => panic!("expected simple view, got {:?}", other),
    }
}

#[tokio::test]
async fn test_start_is_rejected_while_running() {
    let gate = Arc::new(Notify::new());
    let mut provider = QueuedProvider::new(vec![Ok(1e6)], 1e6, 5.0);
    provider.gate = Some(gate.clone());
    let service = service_with(provider);

    assert_eq!(
        service.request_run(Role::ItAdmin).await.unwrap(),
        StartOutcome::Started
    );
    for role in Role::ALL {
        assert_eq!(
            service.request_run(role).await.unwrap(),
            StartOutcome::AlreadyRunning
        );
    }

    gate.notify_one();
    assert!(matches!(
        service.wait_for_run().await,
        Some(RunOutcome::Completed(_))
    ));
}

#[tokio::test]
async fn test_failed_run_does_not_lock_out_next_run() {
    let service = service_with(QueuedProvider::new(
        vec![Err("socket closed".to_string()), Ok(30e6)],
        6e6,
        15.0,
    ));

    let outcome = run_once(&service, Role::ItAdmin).await;
    assert!(matches!(outcome, RunOutcome::Failed(ref m) if m.contains("socket closed")));
    assert_eq!(service.run_state().phase, RunPhase::Failed);

    let outcome = run_once(&service, Role::ItAdmin).await;
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(service.export(Role::ItAdmin).await.unwrap().total_tests, 1);
}

#[tokio::test]
async fn test_diagnostics_average_only_the_last_ten_runs() {
    let mut downloads = vec![Ok(10e6); 10];
    downloads.push(Ok(40e6));
    let service = service_with(QueuedProvider::new(downloads, 6e6, 15.0));

    for _ in 0..11 {
        run_once(&service, Role::ItAdmin).await;
    }

    let summary = service.diagnostics(Role::ItAdmin).await.unwrap();
    assert_eq!(summary.avg_download, 13.0);
    assert_eq!(summary.tests_today, 11);
}

#[tokio::test]
async fn test_clear_history_is_admin_only() {
    let service = service_with(QueuedProvider::new(vec![Ok(10e6), Ok(10e6)], 6e6, 15.0));
    run_once(&service, Role::ItAdmin).await;
    run_once(&service, Role::IspSupport).await;

    assert!(matches!(
        service.clear_history(Role::HomeUser).await,
        Err(ServiceError::Unauthorized(_))
    ));
    assert_eq!(service.export(Role::ItAdmin).await.unwrap().total_tests, 2);

    service.clear_history(Role::ItAdmin).await.unwrap();
    assert_eq!(service.export(Role::ItAdmin).await.unwrap().total_tests, 0);
}

#[tokio::test]
async fn test_report_before_any_completed_run() {
    let service = service_with(QueuedProvider::new(vec![], 1e6, 1.0));
    assert!(matches!(
        service.generate_report(Role::IspSupport),
        Err(ServiceError::NoResults)
    ));

    // A failed run still leaves nothing to report on.
    run_once(&service, Role::IspSupport).await;
    assert!(matches!(
        service.generate_report(Role::IspSupport),
        Err(ServiceError::NoResults)
    ));
}

#[tokio::test]
async fn test_history_keeps_most_recent_fifty() {
    let downloads = (1..=60).map(|i| Ok(i as f64 * 1e6)).collect();
    let service = service_with(QueuedProvider::new(downloads, 6e6, 15.0));

    for _ in 0..60 {
        run_once(&service, Role::ItAdmin).await;
    }

    let export = service.export(Role::ItAdmin).await.unwrap();
    assert_eq!(export.total_tests, 50);
    assert_eq!(export.test_history[0].result.download_mbps, 11.0);
    assert_eq!(export.test_history[49].result.download_mbps, 60.0);
}
