//! HTTP parameter store backend

use super::{ConfigError, SecretProvider};
use crate::error::HarvestError;
use crate::network::HttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParameterResponse {
    parameter: Parameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter {
    value: String,
}

/// Parameter store reached with `GET {endpoint}?name=..&with_decryption=..`
pub struct HttpSecretProvider {
    client: HttpClient,
    endpoint: String,
    with_decryption: bool,
}

impl HttpSecretProvider {
    pub fn new(client: HttpClient, endpoint: impl Into<String>, with_decryption: bool) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            with_decryption,
        }
    }

    fn lookup_url(&self, name: &str) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Misconfigured(format!("{}: {}", self.endpoint, e)))?;
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("with_decryption", if self.with_decryption { "true" } else { "false" });
        Ok(url)
    }
}

#[async_trait]
impl SecretProvider for HttpSecretProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn get_secret(&self, name: &str) -> Result<String, ConfigError> {
        let url = self.lookup_url(name)?;
        debug!("Resolving secret {} from {}", name, url.host_str().unwrap_or("?"));

        match self
            .client
            .get_json::<ParameterResponse>(url.as_str(), LOOKUP_TIMEOUT)
            .await
        {
            Ok(response) => Ok(response.parameter.value),
            Err(HarvestError::HttpStatus { status: 404, .. }) => {
                Err(ConfigError::Missing(name.to_string()))
            }
            Err(e) => Err(ConfigError::Unavailable {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider(server: &MockServer) -> HttpSecretProvider {
        HttpSecretProvider::new(
            HttpClient::new().unwrap(),
            format!("{}/parameters", server.uri()),
            true,
        )
    }

    #[tokio::test]
    async fn test_resolves_parameter_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/parameters"))
            .and(query_param("name", "google_api_key"))
            .and(query_param("with_decryption", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"Parameter": {"Name": "google_api_key", "Value": "AIza123", "Type": "SecureString"}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let value = provider(&server)
            .await
            .get_secret("google_api_key")
            .await
            .unwrap();
        assert_eq!(value, "AIza123");
    }

    #[tokio::test]
    async fn test_not_found_maps_to_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = provider(&server).await.get_secret("nope").await.unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .get_secret("google_api_key")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Unavailable { .. }));
    }
}
