//! Inbound request bodies for the completion and prediction routes.
//!
//! Sampling fields keep JSON numbers as-is; range and integer checks belong
//! to the server, which knows the error taxonomy.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// `POST /v1/completions` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Completions requested per prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<Number>,
}

impl CompletionRequest {
    /// Sampling overrides carried at the top level of the body.
    pub fn parameters(&self) -> PredictParameters {
        PredictParameters {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens.clone(),
        }
    }
}

/// `POST /predict` body, in either the `instances` or the single `prompt` form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<Vec<PredictInstance>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<PredictParameters>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictInstance {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Shared sampling parameters. Accepts the managed service's camelCase names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, alias = "topP", skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, alias = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Number>,
}
