//! Response envelopes.

use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_common::{
    CompletionChoice, CompletionResponse, GeneratedText, GenericPredictResponse, Prediction,
    PredictionsResponse,
};

use crate::backend::Completion;
use crate::translate::ProtocolVariant;

/// Per-request metadata stamped onto every envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// Unix seconds.
    pub created: i64,
    /// Backend identifier.
    pub model: String,
}

impl ResponseMetadata {
    pub fn now(model: &str) -> Self {
        Self {
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
        }
    }
}

/// Envelope matching the caller's protocol variant.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    Completion(CompletionResponse),
    Predictions(PredictionsResponse),
    Generic(GenericPredictResponse),
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        match self {
            GatewayResponse::Completion(body) => Json(body).into_response(),
            GatewayResponse::Predictions(body) => Json(body).into_response(),
            GatewayResponse::Generic(body) => Json(body).into_response(),
        }
    }
}

pub fn shape(
    completions: Vec<Completion>,
    variant: ProtocolVariant,
    metadata: &ResponseMetadata,
) -> GatewayResponse {
    match variant {
        ProtocolVariant::Completion => {
            let choices = completions
                .into_iter()
                .enumerate()
                .map(|(index, completion)| CompletionChoice {
                    index: index as u32,
                    text: completion.text.to_text(),
                    finish_reason: completion.finish_reason,
                })
                .collect();
            GatewayResponse::Completion(CompletionResponse::new(
                metadata.model.clone(),
                metadata.created,
                choices,
            ))
        }
        ProtocolVariant::Prediction => GatewayResponse::Predictions(PredictionsResponse {
            predictions: completions
                .into_iter()
                .map(|completion| Prediction {
                    text: completion.text,
                })
                .collect(),
            model: metadata.model.clone(),
            created: metadata.created,
        }),
        ProtocolVariant::GenericPredict => GatewayResponse::Generic(GenericPredictResponse {
            model: metadata.model.clone(),
            response: completions
                .into_iter()
                .next()
                .map(|completion| completion.text)
                .unwrap_or_else(|| GeneratedText::Text(String::new())),
        }),
    }
}
