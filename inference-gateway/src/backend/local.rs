//! Local batched engine backend.
//!
//! The engine owns batching and scheduling. The adapter hands it every prompt
//! of a request in a single call and never splits a request into per-prompt
//! calls. Concurrent requests share one engine handle; queueing and
//! backpressure across requests are left entirely to the engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gateway_common::FinishReason;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{status_error, transport_error, Completion};
use crate::error::{Error, Result};
use crate::sampling::SamplingConfig;

const LOAD_POLL_INTERVAL_MS: u64 = 500;

/// A loaded text-generation engine.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Model the engine serves.
    fn model_id(&self) -> &str;

    /// Block until the model is loaded and the engine accepts work.
    async fn load(&self) -> Result<()>;

    /// Generate one completion per prompt in a single batched call.
    async fn generate(&self, prompts: &[String], config: &SamplingConfig) -> Result<Vec<Completion>>;
}

/// Adapter over an exclusive, process-lifetime engine handle.
pub struct LocalEngineAdapter {
    engine: Arc<dyn GenerationEngine>,
}

impl LocalEngineAdapter {
    /// Load the engine and wrap it. Only returns once the engine is ready.
    pub async fn load(engine: Arc<dyn GenerationEngine>) -> Result<Self> {
        let start = Instant::now();
        engine.load().await?;
        tracing::info!(
            "Local engine ready for {} ({:?})",
            engine.model_id(),
            start.elapsed()
        );
        Ok(Self { engine })
    }

    pub fn model_id(&self) -> &str {
        self.engine.model_id()
    }

    pub async fn generate(
        &self,
        prompts: &[String],
        config: &SamplingConfig,
    ) -> Result<Vec<Completion>> {
        tracing::debug!(
            "Local engine batch: model={} prompts={}",
            self.engine.model_id(),
            prompts.len()
        );
        self.engine.generate(prompts, config).await
    }
}

/// Engine reached through a vLLM-style OpenAI-compatible completions server.
pub struct OpenAiCompatibleEngine {
    http_client: Client,
    base_url: String,
    model: String,
    startup_timeout: Duration,
}

impl OpenAiCompatibleEngine {
    pub fn new(base_url: &str, model: &str, startup_timeout_secs: u64) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            startup_timeout: Duration::from_secs(startup_timeout_secs),
        }
    }

    /// Whether the engine currently lists our model.
    async fn model_listed(&self) -> Result<bool> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        Ok(models.data.iter().any(|m| m.id == self.model))
    }
}

// ============================================================================
// Engine API types
// ============================================================================

#[derive(Debug, Serialize)]
struct EngineCompletionRequest<'a> {
    model: &'a str,
    prompt: &'a [String],
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    n: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct EngineCompletionResponse {
    choices: Vec<EngineChoice>,
}

#[derive(Debug, Deserialize)]
struct EngineChoice {
    index: usize,
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait]
impl GenerationEngine for OpenAiCompatibleEngine {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn load(&self) -> Result<()> {
        let start = Instant::now();

        loop {
            match self.model_listed().await {
                Ok(true) => return Ok(()),
                Ok(false) => tracing::debug!("Engine up but {} not listed yet", self.model),
                Err(e) => tracing::debug!("Engine not reachable yet: {}", e),
            }

            if start.elapsed() >= self.startup_timeout {
                return Err(Error::BackendUnavailable(format!(
                    "engine at {} did not load {} within {:?}",
                    self.base_url, self.model, self.startup_timeout
                )));
            }

            tokio::time::sleep(Duration::from_millis(LOAD_POLL_INTERVAL_MS)).await;
        }
    }

    async fn generate(&self, prompts: &[String], config: &SamplingConfig) -> Result<Vec<Completion>> {
        let request = EngineCompletionRequest {
            model: &self.model,
            prompt: prompts,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            n: 1,
            stream: false,
        };

        let url = format!("{}/v1/completions", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let engine_response: EngineCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("unreadable engine response: {}", e)))?;

        order_choices(engine_response.choices, prompts.len())
    }
}

/// Put engine choices back into prompt order, one per prompt.
fn order_choices(mut choices: Vec<EngineChoice>, expected: usize) -> Result<Vec<Completion>> {
    choices.sort_by_key(|c| c.index);

    let in_order = choices.len() == expected && choices.iter().enumerate().all(|(i, c)| c.index == i);
    if !in_order {
        return Err(Error::Internal(format!(
            "engine returned choices {:?} for {} prompts",
            choices.iter().map(|c| c.index).collect::<Vec<_>>(),
            expected
        )));
    }

    Ok(choices
        .into_iter()
        .map(|c| {
            let finish_reason = c
                .finish_reason
                .as_deref()
                .map(FinishReason::from_backend)
                .unwrap_or(FinishReason::Unknown);
            Completion::new(c.text, Some(finish_reason))
        })
        .collect())
}
