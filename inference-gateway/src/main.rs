//! Inference Gateway - serves completion/prediction APIs in front of a
//! local engine or a managed prediction service.

use std::path::PathBuf;

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use inference_gateway::auth::TokenSource;
use inference_gateway::config::{Config, ManagedConfig};
use inference_gateway::tasks::{
    self, pipeline, CloudLoggingWriter, CloudStorage, InProcessPipeline, PipelineRunner, Severity,
    StructuredLogWriter, VertexPipelines,
};

#[derive(Debug, Parser)]
#[command(name = "inference-gateway", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the gateway (default).
    Serve,
    /// Write a structured audit marker entry to Cloud Logging.
    AuditLog {
        #[arg(long)]
        project: String,
        /// Marker to find in log sinks and alert tests.
        #[arg(long, default_value = "first-pass")]
        label: String,
        #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,
    },
    /// Compile the generate-and-store text pipeline and submit it.
    TextPipeline {
        #[arg(long)]
        project: String,
        #[arg(long)]
        region: String,
        /// Staging bucket for the pipeline root and run records, with or without gs://.
        #[arg(long, alias = "bucket")]
        staging_bucket: String,
        #[arg(long, default_value = "sample_prompt.txt")]
        prompt_file: PathBuf,
        #[arg(long, default_value = pipeline::DEFAULT_PIPELINE_MODEL)]
        model_id: String,
        #[arg(long, default_value_t = pipeline::DEFAULT_PIPELINE_TEMPERATURE)]
        temperature: f64,
        #[arg(long, default_value_t = pipeline::DEFAULT_PIPELINE_MAX_OUTPUT_TOKENS)]
        max_output_tokens: u32,
        #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,
        #[arg(long, value_enum, default_value_t = PipelineMode::Submit)]
        mode: PipelineMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PipelineMode {
    /// Submit a managed pipeline job.
    Submit,
    /// Run both steps in this process.
    InProcess,
}

fn token_source(access_token: Option<String>) -> TokenSource {
    TokenSource::from_config(&ManagedConfig {
        access_token,
        ..ManagedConfig::default()
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = Config::load().map_err(|e| {
                format!(
                    "Failed to load configuration: {}. \
                     Make sure gateway.toml exists or set GATEWAY__SECTION__KEY environment variables.",
                    e
                )
            })?;
            inference_gateway::logging::init(&config.logging.level);
            tracing::info!(
                "Starting inference-gateway {} (backend: {:?})",
                env!("CARGO_PKG_VERSION"),
                config.backend.kind
            );
            inference_gateway::serve(config).await?;
        }
        Command::AuditLog {
            project,
            label,
            access_token,
        } => {
            inference_gateway::logging::init("info");
            let writer = CloudLoggingWriter::new(
                &project,
                tasks::audit::AUDIT_LOG_NAME,
                token_source(access_token),
            );
            writer
                .log(&tasks::audit_payload(&label), Severity::Notice)
                .await?;
            println!("Wrote structured log with label={}", label);
        }
        Command::TextPipeline {
            project,
            region,
            staging_bucket,
            prompt_file,
            model_id,
            temperature,
            max_output_tokens,
            access_token,
            mode,
        } => {
            inference_gateway::logging::init("info");
            let prompt = pipeline::read_prompt(&prompt_file)?;

            let api_base_url = ManagedConfig {
                location: region.clone(),
                ..ManagedConfig::default()
            }
            .api_base_url();
            let tokens = token_source(access_token);

            let runner: Box<dyn PipelineRunner> = match mode {
                PipelineMode::Submit => Box::new(VertexPipelines::new(&api_base_url, tokens)),
                PipelineMode::InProcess => {
                    let store = Arc::new(CloudStorage::new(tokens.clone()));
                    Box::new(InProcessPipeline::new(&api_base_url, tokens, store))
                }
            };

            let params = tasks::TextPipelineParams {
                project,
                location: region,
                model_id,
                prompt,
                bucket: staging_bucket,
                temperature,
                max_output_tokens,
            };
            let job = tasks::launch_text_pipeline(runner.as_ref(), &params).await?;
            match job.output_uri {
                Some(uri) => println!("Stored pipeline run at {}", uri),
                None => println!("Submitted pipeline job: {}", job.name),
            }
        }
    }

    Ok(())
}
