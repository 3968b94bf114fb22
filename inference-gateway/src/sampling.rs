//! Sampling parameter resolution.
//!
//! Callers may supply any subset of the sampling parameters. Missing values
//! fall back to the process defaults; supplied values that are out of domain
//! are rejected rather than replaced.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 0.9;
pub const DEFAULT_MAX_TOKENS: u32 = 256;

const MAX_TEMPERATURE: f64 = 2.0;

/// A complete, validated set of sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}
fn default_top_p() -> f64 {
    DEFAULT_TOP_P
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// Caller-supplied sampling parameters, any of which may be absent.
///
/// `max_tokens` is signed so a negative request value surfaces as an
/// `InvalidParameter` instead of a parse failure.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialSamplingConfig {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<i64>,
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<()> {
        check_temperature(self.temperature)?;
        check_top_p(self.top_p)?;
        check_max_tokens(self.max_tokens as i64)?;
        Ok(())
    }
}

fn check_temperature(value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=MAX_TEMPERATURE).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidParameter(format!(
            "temperature must be within [0, 2], got {}",
            value
        )))
    }
}

fn check_top_p(value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(Error::InvalidParameter(format!(
            "top_p must be within (0, 1], got {}",
            value
        )))
    }
}

fn check_max_tokens(value: i64) -> Result<u32> {
    if value > 0 && value <= u32::MAX as i64 {
        Ok(value as u32)
    } else {
        Err(Error::InvalidParameter(format!(
            "max_tokens must be a positive integer, got {}",
            value
        )))
    }
}

/// Merge caller values with defaults into a complete configuration.
pub fn resolve(partial: &PartialSamplingConfig, defaults: &SamplingConfig) -> Result<SamplingConfig> {
    let temperature = match partial.temperature {
        Some(value) => check_temperature(value)?,
        None => defaults.temperature,
    };
    let top_p = match partial.top_p {
        Some(value) => check_top_p(value)?,
        None => defaults.top_p,
    };
    let max_tokens = match partial.max_tokens {
        Some(value) => check_max_tokens(value)?,
        None => defaults.max_tokens,
    };

    Ok(SamplingConfig {
        temperature,
        top_p,
        max_tokens,
    })
}
