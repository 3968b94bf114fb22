//! Inbound body translation.
//!
//! Each route accepts its own body shape. All of them are reduced to a
//! [`GenerationRequest`]: an ordered list of prompts plus whatever sampling
//! parameters the caller supplied.

use gateway_common::{CompletionRequest, PredictParameters, PredictRequest};
use serde::Deserialize;
use serde_json::{Number, Value};

use crate::error::{Error, Result};
use crate::sampling::PartialSamplingConfig;

/// Request/response body shape exposed by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// `{prompt, max_tokens?, temperature?, top_p?, n?}` on `/v1/completions`.
    Completion,
    /// `{instances: [{prompt}..], parameters?}` on `/predict`.
    Prediction,
    /// `{prompt, parameters?}` on `/predict`.
    GenericPredict,
}

impl ProtocolVariant {
    /// `/predict` serves two shapes; an `instances` key selects the multi-instance one.
    pub fn detect_predict(body: &Value) -> Self {
        match body.get("instances") {
            Some(_) => ProtocolVariant::Prediction,
            None => ProtocolVariant::GenericPredict,
        }
    }
}

/// Uniform internal request form.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Never empty; no entry is blank.
    pub prompts: Vec<String>,
    pub sampling: PartialSamplingConfig,
}

pub fn translate(raw: &Value, variant: ProtocolVariant) -> Result<GenerationRequest> {
    if !raw.is_object() {
        return Err(Error::MalformedBody(
            "request body must be a JSON object".to_string(),
        ));
    }

    match variant {
        ProtocolVariant::Completion => {
            let body: CompletionRequest = typed(raw)?;
            check_single_completion(body.n.as_ref())?;
            Ok(GenerationRequest {
                prompts: vec![required_prompt(body.prompt.as_deref(), "prompt")?],
                sampling: sampling_from(&body.parameters(), "")?,
            })
        }
        ProtocolVariant::Prediction => {
            require_objects(raw)?;
            let body: PredictRequest = typed(raw)?;
            let instances = body
                .instances
                .as_deref()
                .filter(|items| !items.is_empty())
                .ok_or_else(|| Error::MissingField("instances required".to_string()))?;

            let prompts = instances
                .iter()
                .enumerate()
                .map(|(i, instance)| {
                    required_prompt(instance.prompt.as_deref(), &format!("instances[{}].prompt", i))
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(GenerationRequest {
                prompts,
                sampling: parameters_from(body.parameters.as_ref())?,
            })
        }
        ProtocolVariant::GenericPredict => {
            require_objects(raw)?;
            let body: PredictRequest = typed(raw)?;
            Ok(GenerationRequest {
                prompts: vec![required_prompt(body.prompt.as_deref(), "prompt")?],
                sampling: parameters_from(body.parameters.as_ref())?,
            })
        }
    }
}

/// Wrongly typed fields are the caller's fault.
fn typed<'a, T: Deserialize<'a>>(raw: &'a Value) -> Result<T> {
    T::deserialize(raw).map_err(|e| Error::InvalidParameter(e.to_string()))
}

/// Serde would also read these structs from positional arrays; only objects are accepted.
fn require_objects(raw: &Value) -> Result<()> {
    if let Some(params) = raw.get("parameters") {
        if !params.is_null() && !params.is_object() {
            return Err(Error::InvalidParameter(
                "parameters must be an object".to_string(),
            ));
        }
    }
    if let Some(Value::Array(items)) = raw.get("instances") {
        if let Some(i) = items.iter().position(|item| !item.is_object()) {
            return Err(Error::MissingField(format!(
                "instances[{}] must be an object with a prompt",
                i
            )));
        }
    }
    Ok(())
}

/// Integer value of a JSON number, accepting whole floats such as `256.0`.
///
/// Fractional numbers yield `None`. Magnitudes beyond `i64` saturate, which
/// keeps them out of every accepted range.
fn whole_number(number: &Number) -> Option<i64> {
    if let Some(value) = number.as_i64() {
        return Some(value);
    }
    if number.as_u64().is_some() {
        return Some(i64::MAX);
    }
    number
        .as_f64()
        .filter(|value| value.fract() == 0.0)
        .map(|value| value as i64)
}

/// The completion protocol only produces one completion per prompt.
fn check_single_completion(n: Option<&Number>) -> Result<()> {
    let Some(n) = n else {
        return Ok(());
    };

    match whole_number(n) {
        Some(1) => Ok(()),
        Some(_) => Err(Error::UnsupportedArity(format!(
            "only n=1 is supported, got n={}",
            n
        ))),
        None => Err(Error::InvalidParameter(format!("n must be an integer, got {}", n))),
    }
}

/// `label` names the prompt field in error messages.
fn required_prompt(prompt: Option<&str>, label: &str) -> Result<String> {
    match prompt {
        Some(prompt) if !prompt.trim().is_empty() => Ok(prompt.to_string()),
        Some(_) => Err(Error::MissingField(format!("{} must not be empty", label))),
        None => Err(Error::MissingField(format!("{} is required", label))),
    }
}

/// Shared `parameters` object of the prediction shapes.
fn parameters_from(parameters: Option<&PredictParameters>) -> Result<PartialSamplingConfig> {
    match parameters {
        None => Ok(PartialSamplingConfig::default()),
        Some(params) => sampling_from(params, "parameters."),
    }
}

fn sampling_from(params: &PredictParameters, prefix: &str) -> Result<PartialSamplingConfig> {
    let max_tokens = match &params.max_tokens {
        None => None,
        Some(number) => Some(whole_number(number).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "{}max_tokens must be an integer, got {}",
                prefix, number
            ))
        })?),
    };

    Ok(PartialSamplingConfig {
        temperature: params.temperature,
        top_p: params.top_p,
        max_tokens,
    })
}
