//! Text completions endpoint (OpenAI-compatible).

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

/// Build the completions router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/completions", post(completions))
}

/// POST /v1/completions - single prompt, single completion.
async fn completions(State(state): State<Arc<AppState>>, body: Bytes) -> Result<GatewayResponse> {
    state.backend()?;
    let body = parse_body(&body)?;
    handle(&state, &body, ProtocolVariant::Completion).await
}
