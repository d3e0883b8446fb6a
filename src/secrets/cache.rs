//! Memoizing wrapper around a secret provider

use super::{ConfigError, SecretProvider};
use async_trait::async_trait;
use moka::future::Cache;

/// Caches successful lookups for the lifetime of the process
///
/// Concurrent lookups of the same name share one backend call. Failures are
/// not cached.
pub struct CachedSecrets<P> {
    inner: P,
    cache: Cache<String, String>,
}

impl<P: SecretProvider> CachedSecrets<P> {
    pub fn new(inner: P) -> Self {
        let cache = Cache::builder().max_capacity(64).build();
        Self { inner, cache }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: SecretProvider> SecretProvider for CachedSecrets<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_secret(&self, name: &str) -> Result<String, ConfigError> {
        self.cache
            .try_get_with(name.to_string(), self.inner.get_secret(name))
            .await
            .map_err(|e| (*e).clone())
    }
}
