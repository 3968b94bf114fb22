//! Generation backends.
//!
//! A gateway instance talks to exactly one backend, chosen at startup from
//! configuration. The set of backends is fixed, so it is a closed enum rather
//! than a registry.

mod local;
mod managed;

pub use local::{GenerationEngine, LocalEngineAdapter, OpenAiCompatibleEngine};
pub use managed::{extract_text, ManagedPredictionAdapter, TEXT_FIELDS};

use std::sync::Arc;

use gateway_common::{FinishReason, GeneratedText};
use reqwest::StatusCode;

use crate::auth::TokenSource;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sampling::SamplingConfig;

/// Which backend this gateway addresses, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    /// Local batched engine serving `model`.
    Local { model: String },
    /// Managed publisher model.
    PublisherModel {
        project: String,
        location: String,
        model_id: String,
    },
    /// Managed deployed endpoint.
    Endpoint {
        project: String,
        location: String,
        endpoint_id: String,
    },
}

impl BackendTarget {
    /// Identifier reported by health checks and response envelopes.
    pub fn id(&self) -> &str {
        match self {
            BackendTarget::Local { model } => model,
            BackendTarget::PublisherModel { model_id, .. } => model_id,
            BackendTarget::Endpoint { endpoint_id, .. } => endpoint_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BackendTarget::Local { .. } => "local_engine",
            BackendTarget::PublisherModel { .. } => "publisher_model",
            BackendTarget::Endpoint { .. } => "endpoint",
        }
    }
}

impl std::fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// One generated result for one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: GeneratedText,
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    pub fn new(text: impl Into<GeneratedText>, finish_reason: Option<FinishReason>) -> Self {
        Self {
            text: text.into(),
            finish_reason,
        }
    }
}

/// The active backend handle. Created once at startup, never mutated.
pub enum Backend {
    Local(LocalEngineAdapter),
    Managed(ManagedPredictionAdapter),
}

impl Backend {
    /// Acquire the backend handle for `target`.
    ///
    /// For the local engine this waits until the engine has loaded the model;
    /// for the managed service it builds the client and probes credentials.
    pub async fn connect(target: &BackendTarget, config: &Config) -> Result<Self> {
        match target {
            BackendTarget::Local { model } => {
                let engine = OpenAiCompatibleEngine::new(
                    &config.local.base_url,
                    model,
                    config.local.startup_timeout_secs,
                );
                let adapter = LocalEngineAdapter::load(Arc::new(engine)).await?;
                Ok(Backend::Local(adapter))
            }
            BackendTarget::PublisherModel { .. } | BackendTarget::Endpoint { .. } => {
                let tokens = TokenSource::from_config(&config.managed);
                tokens.token().await?;
                let adapter = ManagedPredictionAdapter::new(
                    target,
                    &config.managed.api_base_url(),
                    tokens,
                )?;
                Ok(Backend::Managed(adapter))
            }
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Backend::Local(adapter) => adapter.model_id(),
            Backend::Managed(adapter) => adapter.id(),
        }
    }

    /// Generate one completion per prompt, in prompt order.
    pub async fn generate(
        &self,
        prompts: &[String],
        config: &SamplingConfig,
    ) -> Result<Vec<Completion>> {
        let completions = match self {
            Backend::Local(adapter) => adapter.generate(prompts, config).await?,
            Backend::Managed(adapter) => adapter.generate(prompts, config).await?,
        };

        if completions.len() != prompts.len() {
            return Err(Error::Internal(format!(
                "backend returned {} completions for {} prompts",
                completions.len(),
                prompts.len()
            )));
        }

        Ok(completions)
    }
}

/// Classify a non-success HTTP status from a backend.
///
/// Auth, throttling and server-side failures are retryable by the caller;
/// other client errors mean the backend refused this particular request.
pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = format!("{}: {}", status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => Error::BackendUnavailable(detail),
        s if s.is_client_error() => Error::BackendRejected(detail),
        _ => Error::BackendUnavailable(detail),
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> Error {
    Error::BackendUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ids() {
        let local = BackendTarget::Local {
            model: "meta-llama/Llama-2-7b-chat-hf".to_string(),
        };
        assert_eq!(local.id(), "meta-llama/Llama-2-7b-chat-hf");
        assert_eq!(local.kind(), "local_engine");

        let endpoint = BackendTarget::Endpoint {
            project: "p".to_string(),
            location: "l".to_string(),
            endpoint_id: "42".to_string(),
        };
        assert_eq!(endpoint.id(), "42");
        assert_eq!(endpoint.to_string(), "endpoint 42");
    }

    #[test]
    fn test_status_error_classification() {
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "bad"),
            Error::BackendRejected(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, ""),
            Error::BackendRejected(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, ""),
            Error::BackendRejected(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, ""),
            Error::BackendUnavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            Error::BackendUnavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, ""),
            Error::BackendUnavailable(_)
        ));
    }
}
