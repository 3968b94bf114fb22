//! HTTP surface of the gateway.

pub mod completions;
pub mod health;
pub mod predict;

use std::sync::Arc;

use axum::body::Bytes;
use axum::routing::get;
use axum::Router;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::sampling::resolve;
use crate::shape::{shape, GatewayResponse, ResponseMetadata};
use crate::state::AppState;
use crate::translate::{translate, ProtocolVariant};

/// Build the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/ping", get(health::health))
        .merge(completions::router())
        .merge(predict::router())
}

fn parse_body(body: &Bytes) -> Result<Value> {
    serde_json::from_slice(body).map_err(|e| Error::MalformedBody(e.to_string()))
}

/// Translate, resolve, generate, shape.
async fn handle(state: &AppState, body: &Value, variant: ProtocolVariant) -> Result<GatewayResponse> {
    let request = translate(body, variant)?;
    let sampling = resolve(&request.sampling, &state.config.sampling)?;

    tracing::debug!(
        "{:?} request: prompts={} temperature={} top_p={} max_tokens={}",
        variant,
        request.prompts.len(),
        sampling.temperature,
        sampling.top_p,
        sampling.max_tokens
    );

    let completions = state.generate(&request.prompts, &sampling).await?;
    let metadata = ResponseMetadata::now(state.model_id());

    Ok(shape(completions, variant, &metadata))
}
