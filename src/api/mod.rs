//! API layer -- axum routes, role extraction, and error mapping.

mod routes;
pub mod state;

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use self::state::AppState;
use crate::access::Role;
use crate::service::ServiceError;

/// Header carrying the caller's already-authenticated role.
pub const ROLE_HEADER: &str = "x-user-role";

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

/// The caller's role, read from [`ROLE_HEADER`]. Missing or unknown values
/// resolve to the least-privileged role.
#[derive(Debug, Clone, Copy)]
pub struct CallerRole(pub Role);

impl<S: Send + Sync> FromRequestParts<S> for CallerRole {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok());
        Ok(CallerRole(Role::resolve(header)))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ServiceError::NoResults => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
