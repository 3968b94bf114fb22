//! Structured audit log entries.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::TokenSource;
use crate::backend::{status_error, transport_error};
use crate::error::Result;

pub const LOGGING_API: &str = "https://logging.googleapis.com";
pub const AUDIT_LOG_NAME: &str = "adventure-audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

/// Sink for structured log entries.
#[async_trait]
pub trait StructuredLogWriter: Send + Sync {
    async fn log(&self, payload: &Value, severity: Severity) -> Result<()>;
}

/// Payload of the audit marker entry.
pub fn audit_payload(label: &str) -> Value {
    json!({
        "action": "trailhead_test",
        "label": label,
        "timestamp": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        "source": "gcp_adventure",
    })
}

/// Writes entries through the Cloud Logging `entries:write` API.
pub struct CloudLoggingWriter {
    http_client: Client,
    base_url: String,
    log_name: String,
    tokens: TokenSource,
}

impl CloudLoggingWriter {
    pub fn new(project: &str, log_id: &str, tokens: TokenSource) -> Self {
        Self::with_base_url(LOGGING_API, project, log_id, tokens)
    }

    pub fn with_base_url(base_url: &str, project: &str, log_id: &str, tokens: TokenSource) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            log_name: format!("projects/{}/logs/{}", project, log_id),
            tokens,
        }
    }
}

#[async_trait]
impl StructuredLogWriter for CloudLoggingWriter {
    async fn log(&self, payload: &Value, severity: Severity) -> Result<()> {
        let token = self.tokens.token().await?;
        let body = json!({
            "entries": [{
                "logName": self.log_name,
                "resource": { "type": "global" },
                "severity": severity,
                "insertId": uuid::Uuid::new_v4().to_string(),
                "jsonPayload": payload,
            }]
        });

        let response = self
            .http_client
            .post(format!("{}/v2/entries:write", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        tracing::debug!("Wrote {:?} entry to {}", severity, self.log_name);
        Ok(())
    }
}
