//! Inference Gateway Common Types
//!
//! Request bodies and response envelopes shared by the gateway server and its clients.

pub mod completion;
pub mod health;
pub mod prediction;
pub mod request;

pub use completion::{CompletionChoice, CompletionResponse, FinishReason};
pub use health::{HealthResponse, HealthStatus};
pub use prediction::{GeneratedText, GenericPredictResponse, Prediction, PredictionsResponse};
pub use request::{CompletionRequest, PredictInstance, PredictParameters, PredictRequest};
