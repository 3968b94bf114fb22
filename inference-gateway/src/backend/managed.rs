//! Managed prediction service backend (Vertex AI).

use gateway_common::{FinishReason, GeneratedText};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{status_error, transport_error, BackendTarget, Completion};
use crate::auth::TokenSource;
use crate::error::{Error, Result};
use crate::sampling::SamplingConfig;

/// Prediction fields that may hold generated text, in lookup order.
pub const TEXT_FIELDS: [&str; 2] = ["content", "output"];

/// Adapter over a managed prediction endpoint.
///
/// The resource path is fixed at construction: a deployed endpoint when one
/// was configured, the publisher model otherwise.
pub struct ManagedPredictionAdapter {
    http_client: Client,
    id: String,
    resource: String,
    predict_url: String,
    tokens: TokenSource,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: &'a [Value],
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Value>,
}

/// Resource name addressed by a managed target.
pub(crate) fn resource_path(target: &BackendTarget) -> Result<String> {
    match target {
        BackendTarget::PublisherModel {
            project,
            location,
            model_id,
        } => Ok(format!(
            "projects/{}/locations/{}/publishers/google/models/{}",
            project, location, model_id
        )),
        BackendTarget::Endpoint {
            project,
            location,
            endpoint_id,
        } => Ok(format!(
            "projects/{}/locations/{}/endpoints/{}",
            project, location, endpoint_id
        )),
        BackendTarget::Local { .. } => Err(Error::Config(
            "local engine target has no managed resource path".to_string(),
        )),
    }
}

/// Sampling parameters in the managed service's naming.
pub(crate) fn managed_parameters(config: &SamplingConfig) -> Value {
    json!({
        "temperature": config.temperature,
        "topP": config.top_p,
        "maxOutputTokens": config.max_tokens,
    })
}

/// Pull the generated text out of one raw prediction.
///
/// Takes the first of [`TEXT_FIELDS`] holding a non-empty string. Anything
/// else is surfaced whole as `RawField`.
pub fn extract_text(prediction: Value) -> GeneratedText {
    if let Value::String(text) = prediction {
        return GeneratedText::Text(text);
    }

    if let Value::Object(ref fields) = prediction {
        let found = TEXT_FIELDS
            .iter()
            .find_map(|name| fields.get(*name).and_then(Value::as_str).filter(|s| !s.is_empty()));
        if let Some(text) = found {
            return GeneratedText::Text(text.to_string());
        }
    }

    tracing::warn!(
        "Prediction has none of {:?}; returning raw prediction",
        TEXT_FIELDS
    );
    GeneratedText::RawField(prediction)
}

impl ManagedPredictionAdapter {
    pub fn new(target: &BackendTarget, api_base_url: &str, tokens: TokenSource) -> Result<Self> {
        let resource = resource_path(target)?;
        let predict_url = format!(
            "{}/v1/{}:predict",
            api_base_url.trim_end_matches('/'),
            resource
        );

        tracing::info!("Managed prediction target: {}", resource);

        Ok(Self {
            http_client: Client::new(),
            id: target.id().to_string(),
            resource,
            predict_url,
            tokens,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Raw predict call: one request carrying every instance.
    pub async fn predict(&self, instances: &[Value], parameters: &Value) -> Result<Vec<Value>> {
        let token = self.tokens.token().await?;

        tracing::debug!(
            "Sending predict request: {} instances={}",
            self.resource,
            instances.len()
        );

        let response = self
            .http_client
            .post(&self.predict_url)
            .bearer_auth(token)
            .json(&PredictRequest {
                instances,
                parameters,
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let predict_response: PredictResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("unreadable prediction response: {}", e)))?;

        Ok(predict_response.predictions)
    }

    pub async fn generate(
        &self,
        prompts: &[String],
        config: &SamplingConfig,
    ) -> Result<Vec<Completion>> {
        let instances: Vec<Value> = prompts.iter().map(|p| json!({ "prompt": p })).collect();
        let predictions = self.predict(&instances, &managed_parameters(config)).await?;

        Ok(predictions
            .into_iter()
            .map(|p| Completion::new(extract_text(p), Some(FinishReason::Unknown)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> BackendTarget {
        BackendTarget::PublisherModel {
            project: "proj".to_string(),
            location: "us-central1".to_string(),
            model_id: "text-bison@001".to_string(),
        }
    }

    #[test]
    fn test_publisher_resource_path() {
        assert_eq!(
            resource_path(&publisher()).unwrap(),
            "projects/proj/locations/us-central1/publishers/google/models/text-bison@001"
        );
    }

    #[test]
    fn test_endpoint_resource_path() {
        let target = BackendTarget::Endpoint {
            project: "proj".to_string(),
            location: "europe-west4".to_string(),
            endpoint_id: "987".to_string(),
        };
        assert_eq!(
            resource_path(&target).unwrap(),
            "projects/proj/locations/europe-west4/endpoints/987"
        );
    }

    #[test]
    fn test_local_target_has_no_resource() {
        let target = BackendTarget::Local {
            model: "m".to_string(),
        };
        assert!(resource_path(&target).is_err());
    }

    #[test]
    fn test_predict_url() {
        let adapter = ManagedPredictionAdapter::new(
            &publisher(),
            "https://us-central1-aiplatform.googleapis.com/",
            TokenSource::Static("t".to_string()),
        )
        .unwrap();
        assert_eq!(
            adapter.predict_url,
            "https://us-central1-aiplatform.googleapis.com/v1/projects/proj/locations/us-central1/publishers/google/models/text-bison@001:predict"
        );
        assert_eq!(adapter.id(), "text-bison@001");
    }

    #[test]
    fn test_extract_prefers_content() {
        let prediction = json!({"content": "from content", "output": "from output"});
        assert_eq!(extract_text(prediction), GeneratedText::from("from content"));
    }

    #[test]
    fn test_extract_falls_through_to_output() {
        assert_eq!(
            extract_text(json!({"output": "from output"})),
            GeneratedText::from("from output")
        );
        assert_eq!(
            extract_text(json!({"content": "", "output": "second"})),
            GeneratedText::from("second")
        );
    }

    #[test]
    fn test_extract_plain_string_prediction() {
        assert_eq!(extract_text(json!("bare")), GeneratedText::from("bare"));
    }

    #[test]
    fn test_extract_raw_fallback() {
        let prediction = json!({"generated_text": "x", "safetyAttributes": {}});
        assert_eq!(
            extract_text(prediction.clone()),
            GeneratedText::RawField(prediction)
        );
        assert!(extract_text(json!({"content": 5})).is_raw());
    }

    #[test]
    fn test_managed_parameters_use_service_names() {
        let params = managed_parameters(&SamplingConfig::default());
        assert_eq!(params["temperature"], 0.7);
        assert_eq!(params["topP"], 0.9);
        assert_eq!(params["maxOutputTokens"], 256);
    }
}
