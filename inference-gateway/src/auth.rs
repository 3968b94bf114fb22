//! Access tokens for Google Cloud APIs.

use reqwest::Client;
use serde::Deserialize;

use crate::config::ManagedConfig;
use crate::error::{Error, Result};

/// Default token endpoint of the GCE / Cloud Run metadata server.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Where bearer tokens come from.
///
/// Metadata tokens are fetched per call; the metadata server caches and
/// refreshes them itself.
#[derive(Clone)]
pub enum TokenSource {
    Static(String),
    MetadataServer { http_client: Client, url: String },
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl TokenSource {
    pub fn from_config(config: &ManagedConfig) -> Self {
        match config.access_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => TokenSource::Static(token.to_string()),
            None => TokenSource::metadata_server(METADATA_TOKEN_URL),
        }
    }

    pub fn metadata_server(url: &str) -> Self {
        TokenSource::MetadataServer {
            http_client: Client::new(),
            url: url.to_string(),
        }
    }

    pub async fn token(&self) -> Result<String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::MetadataServer { http_client, url } => {
                let response = http_client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| {
                        Error::BackendUnavailable(format!("metadata server unreachable: {}", e))
                    })?;

                if !response.status().is_success() {
                    return Err(Error::BackendUnavailable(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }

                let token: MetadataToken = response.json().await.map_err(|e| {
                    Error::BackendUnavailable(format!("invalid metadata token response: {}", e))
                })?;
                Ok(token.access_token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_token() {
        let config = ManagedConfig {
            access_token: Some("ya29.static".to_string()),
            ..ManagedConfig::default()
        };
        let source = TokenSource::from_config(&config);
        assert_eq!(source.token().await.unwrap(), "ya29.static");
    }

    #[tokio::test]
    async fn test_metadata_server_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.metadata",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let source = TokenSource::metadata_server(&format!("{}/token", server.uri()));
        assert_eq!(source.token().await.unwrap(), "ya29.metadata");
    }

    #[tokio::test]
    async fn test_metadata_server_failure_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = TokenSource::metadata_server(&format!("{}/token", server.uri()));
        assert!(matches!(
            source.token().await,
            Err(Error::BackendUnavailable(_))
        ));
    }
}
