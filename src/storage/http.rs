//! S3-style HTTP object store

use super::{ObjectStore, StoreCredentials, StoreError};
use crate::config::AccessPolicy;
use crate::network::HttpClient;
use crate::secrets::Secret;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;
use url::Url;

const ACL_HEADER: &str = "x-amz-acl";

/// Uploads with a single path-style `PUT {endpoint}/{bucket}/{key}` per object
pub struct HttpObjectStore {
    client: HttpClient,
    endpoint: Url,
    acl: AccessPolicy,
    credentials: StoreCredentials,
}

impl HttpObjectStore {
    pub fn new(
        client: HttpClient,
        endpoint: &str,
        acl: AccessPolicy,
        credentials: StoreCredentials,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("storage endpoint {} cannot be used as a base URL", endpoint);
        }
        Ok(Self {
            client,
            endpoint,
            acl,
            credentials,
        })
    }

    /// URL of an object
    ///
    /// Bucket and key segments are encoded the way SigV4 canonicalizes them:
    /// everything but unreserved characters is percent-encoded.
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url, StoreError> {
        if bucket.is_empty() || key.is_empty() || key.split('/').any(|s| s.is_empty() || s == "..") {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let mut path = self.endpoint.path().trim_end_matches('/').to_string();
        for segment in std::iter::once(bucket).chain(key.split('/')) {
            path.push('/');
            path.push_str(&urlencoding::encode(segment));
        }
        let mut url = self.endpoint.clone();
        url.set_path(&path);
        Ok(url)
    }

    fn headers(&self, url: &Url, body: &[u8]) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(ACL_HEADER),
            HeaderValue::from_static(self.acl.as_str()),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));

        match self.credentials {
            StoreCredentials::Anonymous => {}
            StoreCredentials::Bearer(ref token) => {
                headers.insert(AUTHORIZATION, bearer(token)?);
            }
            StoreCredentials::SigV4(ref signer) => {
                signer.sign("PUT", url, &mut headers, body, Utc::now())?;
            }
        }
        Ok(headers)
    }
}

fn bearer(token: &Secret) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(&format!("Bearer {}", token.expose()))
        .map_err(|e| StoreError::Auth(format!("invalid bearer token: {}", e)))
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), StoreError> {
        let url = self.object_url(bucket, key)?;
        let headers = self.headers(&url, &body)?;
        let size = body.len();

        let response = self
            .client
            .put_bytes(url.as_str(), headers, body)
            .await
            .map_err(|e| StoreError::Transport {
                key: key.to_string(),
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        debug!("Stored {} bytes at {}/{}", size, bucket, key);
        Ok(())
    }
}
