//! Prediction endpoint (Vertex custom-prediction style).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::Router;

use super::{handle, parse_body};
use crate::error::Result;
use crate::shape::GatewayResponse;
use crate::state::AppState;
use crate::translate::ProtocolVariant;

/// Build the predict router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/predict", post(predict))
}

/// POST /predict - `{instances, parameters?}` or `{prompt, parameters?}`.
async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<GatewayResponse> {
    state.backend()?;
    let body = parse_body(&body)?;
    let variant = ProtocolVariant::detect_predict(&body);
    handle(&state, &body, variant).await
}
