//! API route definitions.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use super::CallerRole;
use crate::service::{ServiceError, DEFAULT_HISTORY_DAYS};

type ApiResult = Result<Json<Value>, ServiceError>;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/roles", get(list_roles))
        .route("/role", get(current_role))
        .route("/runs", post(request_run))
        .route("/results", get(latest_results))
        .route("/history", get(history))
        .route("/history/clear", post(clear_history))
        .route("/diagnostics", get(diagnostics))
        .route("/report", get(generate_report))
        .route("/export", get(export_data))
        .route("/network-status", get(network_status))
}

fn envelope<T: serde::Serialize>(data: T) -> ApiResult {
    Ok(Json(json!({
        "data": data,
        "meta": { "timestamp": chrono::Utc::now().to_rfc3339() }
    })))
}

async fn health() -> ApiResult {
    envelope(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_roles(State(state): State<AppState>) -> ApiResult {
    envelope(state.service.roles())
}

async fn current_role(State(state): State<AppState>, CallerRole(role): CallerRole) -> ApiResult {
    envelope(json!({ "role": role, "config": state.service.role_profile(role) }))
}

async fn request_run(State(state): State<AppState>, CallerRole(role): CallerRole) -> ApiResult {
    let outcome = state.service.request_run(role).await?;
    envelope(json!({ "status": outcome }))
}

async fn latest_results(State(state): State<AppState>, CallerRole(role): CallerRole) -> ApiResult {
    envelope(state.service.latest(role)?)
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    days: Option<String>,
}

impl HistoryParams {
    /// Look-back in days; absent or non-numeric values fall back to the default.
    fn days(&self) -> i64 {
        self.days
            .as_deref()
            .and_then(|d| d.trim().parse().ok())
            .unwrap_or(DEFAULT_HISTORY_DAYS)
    }
}

async fn history(
    State(state): State<AppState>,
    CallerRole(role): CallerRole,
    Query(params): Query<HistoryParams>,
) -> ApiResult {
    envelope(state.service.history(role, params.days()).await?)
}

async fn clear_history(State(state): State<AppState>, CallerRole(role): CallerRole) -> ApiResult {
    envelope(state.service.clear_history(role).await?)
}

async fn diagnostics(State(state): State<AppState>, CallerRole(role): CallerRole) -> ApiResult {
    envelope(state.service.diagnostics(role).await?)
}

async fn generate_report(State(state): State<AppState>, CallerRole(role): CallerRole) -> ApiResult {
    envelope(state.service.generate_report(role)?)
}

async fn export_data(State(state): State<AppState>, CallerRole(role): CallerRole) -> ApiResult {
    envelope(state.service.export(role).await?)
}

async fn network_status(State(state): State<AppState>, CallerRole(role): CallerRole) -> ApiResult {
    envelope(state.service.network_status(role).await?)
}
