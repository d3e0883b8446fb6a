//! Object storage
//!
//! Defines the [`ObjectStore`] seam the workers upload through, the
//! deterministic key layout, and the HTTP and filesystem backends.

mod fs;
mod http;
mod sigv4;

pub use fs::FsObjectStore;
pub use http::HttpObjectStore;
pub use sigv4::{AwsCredentials, SigV4Signer};

use crate::config::{StorageAuth, StorageBackend, StorageSettings};
use crate::network::HttpClient;
use crate::secrets::{self, ConfigError, Secret, SecretProvider};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors emitted by object store writes
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upload of {key} failed: {reason}")]
    Transport { key: String, reason: String },

    #[error("upload of {key} rejected with HTTP {status}")]
    Rejected { key: String, status: u16 },

    #[error("writing {key} failed: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid object key `{0}`")]
    InvalidKey(String),

    #[error("could not authenticate upload: {0}")]
    Auth(String),
}

/// Write-only blob store addressed by bucket and key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Store `body` under `key`, replacing any existing object
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), StoreError>;
}

/// Path-like key of an uploaded image: `<base>/<phrase_with_underscores>/<index>.jpg`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(base: &str, phrase: &str, index: u32) -> Self {
        Self(format!("{}/{}/{}.jpg", base, phrase.replace(' ', "_"), index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How the http backend authenticates its requests
#[derive(Debug, Clone)]
pub enum StoreCredentials {
    Anonymous,
    Bearer(Secret),
    SigV4(SigV4Signer),
}

/// Look up the credentials the configured backend needs
///
/// A missing or empty session token is not an error; long-lived access keys
/// do not come with one.
pub async fn resolve_credentials<P: SecretProvider + ?Sized>(
    settings: &StorageSettings,
    provider: &P,
) -> Result<StoreCredentials, ConfigError> {
    if settings.backend != StorageBackend::Http {
        return Ok(StoreCredentials::Anonymous);
    }

    match settings.auth {
        StorageAuth::Anonymous => Ok(StoreCredentials::Anonymous),
        StorageAuth::Bearer => {
            let param = settings.token_param.as_deref().ok_or_else(|| {
                ConfigError::Misconfigured("storage.token_param is required for bearer auth".into())
            })?;
            Ok(StoreCredentials::Bearer(secrets::resolve(provider, param).await?))
        }
        StorageAuth::SigV4 => {
            let access_key_id = secrets::resolve(provider, &settings.access_key_param).await?;
            let secret_access_key = secrets::resolve(provider, &settings.secret_key_param).await?;
            let session_token = match settings.session_token_param {
                Some(ref param) => match secrets::resolve(provider, param).await {
                    Ok(token) => Some(token),
                    Err(ConfigError::Missing(_) | ConfigError::Empty(_)) => None,
                    Err(e) => return Err(e),
                },
                None => None,
            };
            let credentials = AwsCredentials {
                access_key_id: access_key_id.expose().to_string(),
                secret_access_key,
                session_token,
            };
            Ok(StoreCredentials::SigV4(SigV4Signer::new(credentials, &settings.region)))
        }
    }
}

/// Build the backend selected in settings
pub fn store_from_settings(
    settings: &StorageSettings,
    client: HttpClient,
    credentials: StoreCredentials,
) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match settings.backend {
        StorageBackend::Http => Arc::new(HttpObjectStore::new(
            client,
            &settings.endpoint,
            settings.acl,
            credentials,
        )?),
        StorageBackend::Filesystem => Arc::new(FsObjectStore::new(&settings.root)),
    };
    Ok(store)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::testing::StaticSecrets;

    fn aws_secrets() -> StaticSecrets {
        StaticSecrets::with("aws_access_key_id", "AKIDEXAMPLE").and("aws_secret_access_key", "secret")
    }

    #[tokio::test]
    async fn test_sigv4_credentials_without_session_token() {
        let credentials = resolve_credentials(&StorageSettings::default(), &aws_secrets())
            .await
            .unwrap();
        match credentials {
            StoreCredentials::SigV4(signer) => assert!(format!("{:?}", signer).contains("AKIDEXAMPLE")),
            other => panic!("expected sigv4 credentials, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sigv4_requires_secret_key() {
        let provider = StaticSecrets::with("aws_access_key_id", "AKIDEXAMPLE");
        let err = resolve_credentials(&StorageSettings::default(), &provider)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(name) if name == "aws_secret_access_key"));
    }

    #[tokio::test]
    async fn test_bearer_and_filesystem_credentials() {
        let mut settings = StorageSettings {
            auth: StorageAuth::Bearer,
            token_param: Some("store_token".to_string()),
            ..StorageSettings::default()
        };
        let provider = StaticSecrets::with("store_token", "t0ken");
        let credentials = resolve_credentials(&settings, &provider).await.unwrap();
        assert!(matches!(credentials, StoreCredentials::Bearer(ref t) if t.expose() == "t0ken"));

        settings.backend = StorageBackend::Filesystem;
        let credentials = resolve_credentials(&settings, &StaticSecrets::default()).await.unwrap();
        assert!(matches!(credentials, StoreCredentials::Anonymous));
    }

    #[test]
    fn test_storage_key_layout() {
        let key = StorageKey::new("validation", "quercus lobata", 0);
        assert_eq!(key.as_str(), "validation/quercus_lobata/0.jpg");

        let key = StorageKey::new("validation", "quercus lobata", 11);
        assert_eq!(key.to_string(), "validation/quercus_lobata/11.jpg");
    }

    #[test]
    fn test_storage_key_only_replaces_spaces() {
        let key = StorageKey::new("validation", "Magnolia  Grandiflora-x.y", 3);
        assert_eq!(key.as_str(), "validation/Magnolia__Grandiflora-x.y/3.jpg");
    }

    #[test]
    fn test_storage_key_is_deterministic() {
        for index in [0, 9, 10, 29] {
            assert_eq!(
                StorageKey::new("validation", "Cornus kousa", index),
                StorageKey::new("validation", "Cornus kousa", index)
            );
        }
    }
}
