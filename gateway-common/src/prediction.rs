//! Vertex-style prediction envelopes.

use serde::{Deserialize, Serialize};

/// Text produced for one prompt.
///
/// Managed prediction services do not agree on a response shape. When none of
/// the known text fields is present the raw prediction is carried through as
/// `RawField` rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedText {
    Text(String),
    RawField(serde_json::Value),
}

impl GeneratedText {
    /// Render as a plain string. Raw values become their compact JSON form.
    pub fn to_text(&self) -> String {
        match self {
            GeneratedText::Text(text) => text.clone(),
            GeneratedText::RawField(value) => value.to_string(),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, GeneratedText::RawField(_))
    }
}

impl From<String> for GeneratedText {
    fn from(text: String) -> Self {
        GeneratedText::Text(text)
    }
}

impl From<&str> for GeneratedText {
    fn from(text: &str) -> Self {
        GeneratedText::Text(text.to_string())
    }
}

/// One entry of a multi-instance prediction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub text: GeneratedText,
}

/// Response for a multi-instance `/predict` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionsResponse {
    pub predictions: Vec<Prediction>,
    pub model: String,
    pub created: i64,
}

/// Response for a single-prompt `/predict` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericPredictResponse {
    pub model: String,
    pub response: GeneratedText,
}
