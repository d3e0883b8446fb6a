//! Secret resolution
//!
//! Credentials are looked up through a [`SecretProvider`] once at startup and
//! then passed explicitly to the components that need them.

mod cache;
mod env;
mod http;

pub use cache::CachedSecrets;
pub use env::EnvSecretProvider;
pub use http::HttpSecretProvider;

use crate::config::{SecretBackend, SecretsSettings};
use crate::network::HttpClient;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors raised while resolving configuration secrets
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("secret `{0}` not found")]
    Missing(String),

    #[error("secret `{0}` is empty")]
    Empty(String),

    #[error("secret store unavailable while resolving `{name}`: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("secret backend misconfigured: {0}")]
    Misconfigured(String),
}

/// Source of named secret values
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Resolve a secret by parameter name
    async fn get_secret(&self, name: &str) -> Result<String, ConfigError>;
}

/// Secret value that never prints itself
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Build the provider selected in settings, wrapped in a lookup cache
pub fn provider_from_settings(
    settings: &SecretsSettings,
    client: HttpClient,
) -> Result<CachedSecrets<Box<dyn SecretProvider>>, ConfigError> {
    let provider: Box<dyn SecretProvider> = match settings.backend {
        SecretBackend::Env => Box::new(EnvSecretProvider::with_prefix(&settings.env_prefix)),
        SecretBackend::Http => {
            let endpoint = settings.endpoint.clone().ok_or_else(|| {
                ConfigError::Misconfigured("secrets.endpoint is required for the http backend".into())
            })?;
            Box::new(HttpSecretProvider::new(client, endpoint, settings.with_decryption))
        }
    };
    Ok(CachedSecrets::new(provider))
}

/// Resolve a secret, rejecting empty values
pub async fn resolve<P: SecretProvider + ?Sized>(
    provider: &P,
    name: &str,
) -> Result<Secret, ConfigError> {
    let value = provider.get_secret(name).await?;
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(name.to_string()));
    }
    Ok(Secret(value))
}

#[async_trait]
impl<P: SecretProvider + ?Sized> SecretProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn get_secret(&self, name: &str) -> Result<String, ConfigError> {
        (**self).get_secret(name).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory provider that counts lookups
    #[derive(Default)]
    pub struct StaticSecrets {
        values: HashMap<String, String>,
        pub lookups: AtomicUsize,
    }

    impl StaticSecrets {
        pub fn with(name: &str, value: &str) -> Self {
            let mut values = HashMap::new();
            values.insert(name.to_string(), value.to_string());
            Self {
                values,
                lookups: AtomicUsize::new(0),
            }
        }

        pub fn and(mut self, name: &str, value: &str) -> Self {
            self.values.insert(name.to_string(), value.to_string());
            self
        }

        pub fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SecretProvider for StaticSecrets {
        fn name(&self) -> &str {
            "static"
        }

        async fn get_secret(&self, name: &str) -> Result<String, ConfigError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.values
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::Missing(name.to_string()))
        }
    }
}
