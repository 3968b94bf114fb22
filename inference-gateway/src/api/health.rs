//! Health/readiness endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use gateway_common::{HealthResponse, HealthStatus};

use crate::state::AppState;

/// GET /health, GET /ping - readiness plus the active backend id.
///
/// Answers 503 until startup has published the backend.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = if state.is_ready() {
        (StatusCode::OK, HealthStatus::Ok)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Loading)
    };

    (
        code,
        Json(HealthResponse {
            status,
            model: state.model_id().to_string(),
        }),
    )
}
