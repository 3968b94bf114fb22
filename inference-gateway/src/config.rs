//! Configuration for the inference gateway.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use crate::backend::BackendTarget;
use crate::error::{Error, Result};
use crate::sampling::SamplingConfig;

/// Main configuration structure for the inference gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Process-level sampling defaults applied when a caller omits a value.
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub local: LocalEngineConfig,
    #[serde(default)]
    pub managed: ManagedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for a single backend generate call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Which backend family serves this gateway instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Local,
    Managed,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
}

/// Local batched engine (vLLM-style server speaking the OpenAI completions API).
#[derive(Debug, Clone, Deserialize)]
pub struct LocalEngineConfig {
    /// Model identifier served by the engine. Required for the local backend.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_engine_url")]
    pub base_url: String,
    /// How long startup waits for the engine to report the model as loaded.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: default_engine_url(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

/// Managed prediction service (Vertex AI).
#[derive(Debug, Clone, Deserialize)]
pub struct ManagedConfig {
    /// Cloud project. Required for the managed backend.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_location")]
    pub location: String,
    /// Publisher model id, ignored when `endpoint_id` is set.
    #[serde(default = "default_managed_model")]
    pub model_id: String,
    /// Deployed endpoint id. Its presence switches addressing to the endpoint path.
    #[serde(default)]
    pub endpoint_id: Option<String>,
    /// Overrides `https://{location}-aiplatform.googleapis.com`.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Static bearer token. When unset, tokens come from the metadata server.
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Default for ManagedConfig {
    fn default() -> Self {
        Self {
            project: None,
            location: default_location(),
            model_id: default_managed_model(),
            endpoint_id: None,
            api_base_url: None,
            access_token: None,
        }
    }
}

impl ManagedConfig {
    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.location))
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_engine_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_startup_timeout() -> u64 {
    600
}
fn default_location() -> String {
    "us-central1".to_string()
}
fn default_managed_model() -> String {
    "text-bison@001".to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (GATEWAY__SECTION__KEY format)
    /// 2. gateway.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .add_source(File::with_name("gateway").required(false))
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Check everything that must hold before the gateway may serve traffic.
    pub fn validate(&self) -> Result<BackendTarget> {
        self.sampling
            .validate()
            .map_err(|e| Error::Config(format!("invalid sampling defaults: {}", e)))?;
        self.backend_target()
    }

    /// Resolve which backend this process talks to. Decided once at startup.
    pub fn backend_target(&self) -> Result<BackendTarget> {
        match self.backend.kind {
            BackendKind::Local => {
                let model = non_empty(&self.local.model).ok_or_else(|| {
                    Error::Config(
                        "local.model is required for the local backend \
                         (set GATEWAY__LOCAL__MODEL)"
                            .to_string(),
                    )
                })?;
                Ok(BackendTarget::Local {
                    model: model.to_string(),
                })
            }
            BackendKind::Managed => {
                let project = non_empty(&self.managed.project)
                    .ok_or_else(|| {
                        Error::Config(
                            "managed.project is required for the managed backend \
                             (set GATEWAY__MANAGED__PROJECT)"
                                .to_string(),
                        )
                    })?
                    .to_string();
                let location = self.managed.location.clone();

                match non_empty(&self.managed.endpoint_id) {
                    Some(endpoint_id) => Ok(BackendTarget::Endpoint {
                        project,
                        location,
                        endpoint_id: endpoint_id.to_string(),
                    }),
                    None => Ok(BackendTarget::PublisherModel {
                        project,
                        location,
                        model_id: self.managed.model_id.clone(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config(kind: BackendKind) -> Config {
    Config {
        server: ServerConfig::default(),
        logging: LoggingConfig::default(),
        sampling: SamplingConfig::default(),
        backend: BackendConfig { kind },
        local: LocalEngineConfig {
            model: Some("facebook/opt-125m".to_string()),
            ..LocalEngineConfig::default()
        },
        managed: ManagedConfig {
            project: Some("test-project".to_string()),
            ..ManagedConfig::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
        assert_eq!(server.request_timeout_secs, 300);
    }

    #[test]
    fn test_default_managed_config() {
        let managed = ManagedConfig::default();
        assert_eq!(managed.location, "us-central1");
        assert_eq!(managed.model_id, "text-bison@001");
        assert_eq!(
            managed.api_base_url(),
            "https://us-central1-aiplatform.googleapis.com"
        );
    }

    #[test]
    fn test_local_target_requires_model() {
        let mut config = test_config(BackendKind::Local);
        config.local.model = None;
        assert!(matches!(config.backend_target(), Err(Error::Config(_))));

        config.local.model = Some("   ".to_string());
        assert!(matches!(config.backend_target(), Err(Error::Config(_))));
    }

    #[test]
    fn test_local_target() {
        let config = test_config(BackendKind::Local);
        assert_eq!(
            config.backend_target().unwrap(),
            BackendTarget::Local {
                model: "facebook/opt-125m".to_string()
            }
        );
    }

    #[test]
    fn test_managed_target_requires_project() {
        let mut config = test_config(BackendKind::Managed);
        config.managed.project = None;
        assert!(matches!(config.backend_target(), Err(Error::Config(_))));
    }

    #[test]
    fn test_endpoint_id_switches_addressing() {
        let mut config = test_config(BackendKind::Managed);
        assert!(matches!(
            config.backend_target().unwrap(),
            BackendTarget::PublisherModel { .. }
        ));

        config.managed.endpoint_id = Some("1234567890".to_string());
        assert_eq!(
            config.backend_target().unwrap(),
            BackendTarget::Endpoint {
                project: "test-project".to_string(),
                location: "us-central1".to_string(),
                endpoint_id: "1234567890".to_string(),
            }
        );

        config.managed.endpoint_id = Some(String::new());
        assert!(matches!(
            config.backend_target().unwrap(),
            BackendTarget::PublisherModel { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_bad_sampling_defaults() {
        let mut config = test_config(BackendKind::Local);
        config.sampling.top_p = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
