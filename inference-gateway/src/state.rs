//! Shared application state.

use std::sync::OnceLock;
use std::time::Duration;

use crate::backend::{Backend, BackendTarget, Completion};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sampling::SamplingConfig;

/// Read-only state passed to all handlers.
///
/// The backend slot is filled exactly once, when startup finishes acquiring
/// the backend. Until then the gateway reports not-ready.
pub struct AppState {
    pub config: Config,
    pub target: BackendTarget,
    backend: OnceLock<Backend>,
}

impl AppState {
    pub fn new(config: Config, target: BackendTarget) -> Self {
        Self {
            config,
            target,
            backend: OnceLock::new(),
        }
    }

    /// Make the loaded backend visible to request handlers.
    pub fn publish(&self, backend: Backend) -> Result<()> {
        let backend_id = backend.id().to_string();
        self.backend
            .set(backend)
            .map_err(|_| Error::Internal("backend already published".to_string()))?;
        tracing::info!("Gateway ready: {} (serving {})", self.target, backend_id);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.backend.get().is_some()
    }

    pub fn backend(&self) -> Result<&Backend> {
        self.backend.get().ok_or_else(|| {
            Error::BackendUnavailable(format!("{} is still loading", self.target))
        })
    }

    /// Identifier reported to callers.
    pub fn model_id(&self) -> &str {
        self.target.id()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.server.request_timeout_secs)
    }

    /// Run one backend generate call under the configured timeout.
    pub async fn generate(
        &self,
        prompts: &[String],
        sampling: &SamplingConfig,
    ) -> Result<Vec<Completion>> {
        let backend = self.backend()?;
        let timeout = self.request_timeout();

        tokio::time::timeout(timeout, backend.generate(prompts, sampling))
            .await
            .map_err(|_| {
                Error::BackendUnavailable(format!("generation timed out after {:?}", timeout))
            })?
    }
}
