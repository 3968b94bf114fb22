//! OpenAI-compatible text completion types.

use serde::{Deserialize, Serialize};

/// Why generation stopped for a single completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model emitted a stop sequence or end-of-sequence token.
    Stop,
    /// The `max_tokens` budget was exhausted.
    Length,
    /// The backend reported something else, or nothing at all.
    Unknown,
}

impl FinishReason {
    /// Map a backend-reported finish reason onto the closed set.
    pub fn from_backend(reason: &str) -> Self {
        match reason {
            "stop" | "eos" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            _ => FinishReason::Unknown,
        }
    }
}

/// OpenAI-compatible text completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

impl CompletionResponse {
    /// Build a completion response whose id is derived from its creation time.
    pub fn new(model: String, created: i64, choices: Vec<CompletionChoice>) -> Self {
        Self {
            id: format!("cmpl-{}", created),
            object: "text_completion".to_string(),
            created,
            model,
            choices,
        }
    }
}
