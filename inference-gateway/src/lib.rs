//! Inference Gateway - translates completion and prediction APIs onto a
//! local batched engine or a managed prediction service.

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod sampling;
pub mod shape;
pub mod state;
pub mod tasks;
pub mod translate;

pub use backend::{Backend, BackendTarget, Completion};
pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;

use std::sync::Arc;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the HTTP application around shared state.
pub fn app(state: Arc<AppState>) -> Router {
    api::router()
        .layer(middleware::from_fn(logging::request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the gateway until the server stops.
///
/// The listener comes up first so health checks can observe loading. The
/// backend is then acquired once; failure to do so ends the process.
pub async fn serve(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let target = config.validate()?;
    let state = Arc::new(AppState::new(config.clone(), target.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {} ({} loading)", addr, target);

    let router = app(state.clone());
    let server = tokio::spawn(async move { axum::serve(listener, router).await });

    let backend = Backend::connect(&target, &config)
        .await
        .map_err(|e| format!("Failed to acquire backend {}: {}", target, e))?;
    state.publish(backend)?;

    server.await??;
    Ok(())
}
