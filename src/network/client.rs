//! HTTP client shared by the search, download and upload stages

use super::user_agent::{accept_image, accept_json, generate_user_agent};
use crate::config::OutgoingSettings;
use crate::error::{HarvestError, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client wrapper with harvester-specific configuration
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> anyhow::Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    ///
    /// No overall request timeout is set here; each call decides its own.
    pub fn with_settings(settings: &OutgoingSettings) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs_f64(settings.connect_timeout))
            .pool_max_idle_per_host(settings.pool_maxsize)
            .gzip(true)
            .brotli(true);

        // SSL verification
        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        // Proxy settings
        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            user_agent: generate_user_agent(settings.useragent_suffix.as_deref()),
        })
    }

    /// GET a JSON document and decode it into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
        let request = self
            .client
            .get(url)
            .timeout(timeout)
            .header(ACCEPT, accept_json());

        let response = self.send(url, request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| HarvestError::network(url, e))?;

        Ok(serde_json::from_str(&text)?)
    }

    /// GET a resource and read its whole body into memory
    pub async fn get_bytes(&self, url: &str, timeout: Option<Duration>) -> Result<Bytes> {
        let mut request = self.client.get(url).header(ACCEPT, accept_image());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = self.send(url, request).await?;
        response
            .bytes()
            .await
            .map_err(|e| HarvestError::network(url, e))
    }

    /// PUT a body and return the raw response
    ///
    /// The status code is left for the caller to interpret.
    pub async fn put_bytes(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> std::result::Result<Response, reqwest::Error> {
        self.client
            .put(url)
            .header(USER_AGENT, &self.user_agent)
            .headers(headers)
            .body(body)
            .send()
            .await
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| HarvestError::network(url, e))?;

        let status = response.status();
        debug!("GET {} -> {}", response.url().path(), status);

        if !status.is_success() {
            return Err(HarvestError::status(url, status.as_u16()));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Ping {
        ok: bool,
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_get_json_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok": true}"#))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = format!("{}/ping", server.uri());
        let ping: Ping = client.get_json(&url, Duration::from_secs(5)).await.unwrap();
        assert!(ping.ok);
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let url = format!("{}/missing.jpg", server.uri());
        let err = client.get_bytes(&url, None).await.unwrap_err();
        assert!(matches!(err, HarvestError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let err = client
            .get_json::<Ping>(&server.uri(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Decode(_)));
    }
}
