//! Two-step text pipeline: generate with a publisher model, store the result.
//!
//! The definition compiles to a pipeline spec (parameter schema plus task
//! DAG). A [`PipelineRunner`] then submits it, either to the managed
//! `pipelineJobs` API or by running the steps in this process.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::storage::{bucket_name, ObjectStore};
use crate::auth::TokenSource;
use crate::backend::{extract_text, status_error, transport_error, BackendTarget, ManagedPredictionAdapter};
use crate::error::{Error, Result};

pub const DEFAULT_PIPELINE_MODEL: &str = "text-bison@001";
pub const DEFAULT_PIPELINE_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_PIPELINE_MAX_OUTPUT_TOKENS: u32 = 256;

pub const TEXT_PIPELINE_NAME: &str = "vertex-text-pipeline";
pub const JOB_DISPLAY_NAME: &str = "gcp-adventure-text-pipeline";

const STRING: &str = "STRING";
const OUTPUT_KEY: &str = "Output";

/// Pipeline-level inputs and their parameter types.
const PIPELINE_INPUTS: [(&str, &str); 7] = [
    ("project", STRING),
    ("location", STRING),
    ("model_id", STRING),
    ("prompt", STRING),
    ("bucket", STRING),
    ("temperature", "NUMBER_DOUBLE"),
    ("max_output_tokens", "NUMBER_INTEGER"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    GenerateText,
    WriteToGcs,
}

impl PipelineStep {
    pub fn name(self) -> &'static str {
        match self {
            PipelineStep::GenerateText => "generate-text",
            PipelineStep::WriteToGcs => "write-to-gcs",
        }
    }

    /// Component inputs: name, parameter type, and where the value comes from.
    fn inputs(self) -> Vec<(&'static str, &'static str, Value)> {
        match self {
            PipelineStep::GenerateText => vec![
                ("project", STRING, pipeline_input("project")),
                ("location", STRING, pipeline_input("location")),
                ("model_id", STRING, pipeline_input("model_id")),
                ("prompt", STRING, pipeline_input("prompt")),
                ("temperature", "NUMBER_DOUBLE", pipeline_input("temperature")),
                ("max_output_tokens", "NUMBER_INTEGER", pipeline_input("max_output_tokens")),
            ],
            PipelineStep::WriteToGcs => vec![
                ("bucket", STRING, pipeline_input("bucket")),
                ("region", STRING, pipeline_input("location")),
                (
                    "text",
                    STRING,
                    json!({
                        "taskOutputParameter": {
                            "producerTask": PipelineStep::GenerateText.name(),
                            "outputParameterKey": OUTPUT_KEY,
                        }
                    }),
                ),
                ("prompt", STRING, pipeline_input("prompt")),
            ],
        }
    }
}

fn pipeline_input(name: &str) -> Value {
    json!({ "componentInputParameter": name })
}

/// Named, ordered list of steps. Each step depends on the one before it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    pub name: String,
    pub steps: Vec<PipelineStep>,
}

impl PipelineDefinition {
    pub fn text_pipeline() -> Self {
        Self {
            name: TEXT_PIPELINE_NAME.to_string(),
            steps: vec![PipelineStep::GenerateText, PipelineStep::WriteToGcs],
        }
    }
}

/// Compiled pipeline: the spec document plus the step order it encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineArtifact {
    pub name: String,
    pub steps: Vec<PipelineStep>,
    pub spec: Value,
}

/// Handle to a submitted run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineJob {
    /// Job resource name, or the pipeline name for in-process runs.
    pub name: String,
    /// Where the run record landed, when known at submit time.
    pub output_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TextPipelineParams {
    pub project: String,
    pub location: String,
    pub model_id: String,
    pub prompt: String,
    /// Staging bucket, with or without the gs:// scheme.
    pub bucket: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl TextPipelineParams {
    pub fn parameter_values(&self) -> Value {
        json!({
            "project": self.project,
            "location": self.location,
            "model_id": self.model_id,
            "prompt": self.prompt,
            "bucket": bucket_name(&self.bucket),
            "temperature": self.temperature,
            "max_output_tokens": self.max_output_tokens,
        })
    }

    pub fn pipeline_root(&self) -> String {
        format!("gs://{}/pipeline-root", bucket_name(&self.bucket))
    }
}

/// Compile a definition into a pipeline spec.
pub fn compile(definition: &PipelineDefinition) -> Result<PipelineArtifact> {
    if definition.steps.is_empty() {
        return Err(Error::Config(format!(
            "pipeline {} has no steps",
            definition.name
        )));
    }

    let mut components = Map::new();
    let mut tasks = Map::new();

    for (i, step) in definition.steps.iter().enumerate() {
        let component = format!("comp-{}", step.name());
        let mut input_types = Map::new();
        let mut bindings = Map::new();
        for (name, kind, source) in step.inputs() {
            input_types.insert(name.to_string(), json!({ "parameterType": kind }));
            bindings.insert(name.to_string(), source);
        }

        components.insert(
            component.clone(),
            json!({
                "executorLabel": format!("exec-{}", step.name()),
                "inputDefinitions": { "parameters": input_types },
                "outputDefinitions": {
                    "parameters": { "Output": { "parameterType": STRING } }
                },
            }),
        );

        let mut task = json!({
            "taskInfo": { "name": step.name() },
            "componentRef": { "name": component },
            "inputs": { "parameters": bindings },
        });
        if i > 0 {
            task["dependentTasks"] = json!([definition.steps[i - 1].name()]);
        }
        tasks.insert(step.name().to_string(), task);
    }

    let root_inputs: Map<String, Value> = PIPELINE_INPUTS
        .iter()
        .map(|(name, kind)| (name.to_string(), json!({ "parameterType": kind })))
        .collect();

    let spec = json!({
        "pipelineInfo": { "name": definition.name },
        "schemaVersion": "2.1.0",
        "sdkVersion": concat!("inference-gateway-", env!("CARGO_PKG_VERSION")),
        "components": components,
        "root": {
            "inputDefinitions": { "parameters": root_inputs },
            "dag": { "tasks": tasks },
        },
    });

    Ok(PipelineArtifact {
        name: definition.name.clone(),
        steps: definition.steps.clone(),
        spec,
    })
}

/// Compiles and submits pipelines.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    fn compile(&self, definition: &PipelineDefinition) -> Result<PipelineArtifact> {
        compile(definition)
    }

    async fn submit(&self, artifact: &PipelineArtifact, params: &TextPipelineParams) -> Result<PipelineJob>;
}

/// Compile the text pipeline and hand it to `runner`.
pub async fn launch_text_pipeline(
    runner: &dyn PipelineRunner,
    params: &TextPipelineParams,
) -> Result<PipelineJob> {
    let artifact = runner.compile(&PipelineDefinition::text_pipeline())?;
    runner.submit(&artifact, params).await
}

/// Read and trim the prompt file.
pub fn read_prompt(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read prompt file {}: {}", path.display(), e)))?;
    let prompt = text.trim();
    if prompt.is_empty() {
        return Err(Error::MissingField(format!(
            "prompt file {} is empty",
            path.display()
        )));
    }
    Ok(prompt.to_string())
}

// ============================================================================
// Managed pipelineJobs
// ============================================================================

#[derive(Debug, Deserialize)]
struct PipelineJobResource {
    name: String,
}

/// Submits compiled specs as managed pipeline jobs.
pub struct VertexPipelines {
    http_client: Client,
    api_base_url: String,
    tokens: TokenSource,
}

impl VertexPipelines {
    pub fn new(api_base_url: &str, tokens: TokenSource) -> Self {
        Self {
            http_client: Client::new(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

#[async_trait]
impl PipelineRunner for VertexPipelines {
    async fn submit(&self, artifact: &PipelineArtifact, params: &TextPipelineParams) -> Result<PipelineJob> {
        let token = self.tokens.token().await?;
        let url = format!(
            "{}/v1/projects/{}/locations/{}/pipelineJobs",
            self.api_base_url, params.project, params.location
        );
        let body = json!({
            "displayName": JOB_DISPLAY_NAME,
            "pipelineSpec": artifact.spec,
            "runtimeConfig": {
                "gcsOutputDirectory": params.pipeline_root(),
                "parameterValues": params.parameter_values(),
            },
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let job: PipelineJobResource = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("unreadable pipeline job response: {}", e)))?;

        tracing::info!("Submitted {} as {}", artifact.name, job.name);
        Ok(PipelineJob {
            name: job.name,
            output_uri: None,
        })
    }
}

// ============================================================================
// In-process runner
// ============================================================================

/// Runs the compiled steps directly, in order.
pub struct InProcessPipeline {
    api_base_url: String,
    tokens: TokenSource,
    store: Arc<dyn ObjectStore>,
}

impl InProcessPipeline {
    pub fn new(api_base_url: &str, tokens: TokenSource, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            tokens,
            store,
        }
    }

    async fn generate_text(&self, params: &TextPipelineParams) -> Result<String> {
        let target = BackendTarget::PublisherModel {
            project: params.project.clone(),
            location: params.location.clone(),
            model_id: params.model_id.clone(),
        };
        let predictor = ManagedPredictionAdapter::new(&target, &self.api_base_url, self.tokens.clone())?;

        let instances = [json!({ "prompt": params.prompt })];
        let parameters = json!({
            "temperature": params.temperature,
            "maxOutputTokens": params.max_output_tokens,
        });

        let prediction = predictor
            .predict(&instances, &parameters)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("prediction service returned no predictions".to_string()))?;

        Ok(extract_text(prediction).to_text())
    }

    /// Store `{prompt, response, region, timestamp}` under `runs/{timestamp}.json`.
    async fn write_run(&self, params: &TextPipelineParams, response: &str) -> Result<String> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string();
        let path = format!("runs/{}.json", timestamp);
        let record = json!({
            "prompt": params.prompt,
            "response": response,
            "region": params.location,
            "timestamp": timestamp,
        });
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| Error::Internal(format!("cannot encode run record: {}", e)))?;

        self.store
            .upload(bucket_name(&params.bucket), &path, bytes, "application/json")
            .await
    }
}

#[async_trait]
impl PipelineRunner for InProcessPipeline {
    async fn submit(&self, artifact: &PipelineArtifact, params: &TextPipelineParams) -> Result<PipelineJob> {
        let mut generated: Option<String> = None;
        let mut output_uri = None;

        for step in &artifact.steps {
            tracing::info!("Pipeline {}: running {}", artifact.name, step.name());
            match step {
                PipelineStep::GenerateText => {
                    generated = Some(self.generate_text(params).await?);
                }
                PipelineStep::WriteToGcs => {
                    let text = generated.as_deref().ok_or_else(|| {
                        Error::Config(format!(
                            "{} runs before {} produced any text",
                            step.name(),
                            PipelineStep::GenerateText.name()
                        ))
                    })?;
                    output_uri = Some(self.write_run(params, text).await?);
                }
            }
        }

        Ok(PipelineJob {
            name: artifact.name.clone(),
            output_uri,
        })
    }
}
