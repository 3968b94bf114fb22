//! One-shot operational tasks that share the gateway's managed-service plumbing.

pub mod audit;
pub mod pipeline;
pub mod storage;

pub use audit::{audit_payload, CloudLoggingWriter, Severity, StructuredLogWriter};
pub use pipeline::{
    launch_text_pipeline, InProcessPipeline, PipelineDefinition, PipelineJob, PipelineRunner,
    TextPipelineParams, VertexPipelines,
};
pub use storage::{CloudStorage, ObjectStore};
