// SPDX-License-Identifier: Apache-2.0
//! `/healthz` and `/readyz`.
//!
//! Both were added because every long-running service in this workspace
//! exposes them for its orchestrator, and a gateway is no exception.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Liveness: the process is up and answering HTTP. Always 200.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Readiness: the process can usefully serve CAS traffic, i.e. at least one
/// backend is currently online.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.blob().manager().has_online_backends().await {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "reason": "no backends online" })),
        )
    }
}
