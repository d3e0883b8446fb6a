//! Fetch-and-store unit of work

use crate::error::Result;
use crate::metrics::Metrics;
use crate::network::HttpClient;
use crate::storage::{ObjectStore, StorageKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One image to download and upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Absolute result index (offset + position)
    pub index: u32,
    pub key: StorageKey,
    pub link: String,
}

/// Downloads images and forwards them to the object store
#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    store: Arc<dyn ObjectStore>,
    bucket: Arc<str>,
    image_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
}

impl Fetcher {
    pub fn new(
        client: HttpClient,
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        image_timeout: Option<Duration>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            store,
            bucket: Arc::from(bucket),
            image_timeout,
            metrics,
        }
    }

    /// Fetch `source_url` and store its body under `key`; returns bytes stored
    ///
    /// The store is not touched when the download fails.
    pub async fn fetch_and_store(&self, key: &StorageKey, source_url: &str) -> Result<u64> {
        let body = match self.client.get_bytes(source_url, self.image_timeout).await {
            Ok(body) => body,
            Err(e) => {
                self.metrics.record_failure("fetch", e.kind());
                return Err(e);
            }
        };
        self.metrics.record_fetch();

        let size = body.len() as u64;
        if let Err(e) = self.store.put(&self.bucket, key.as_str(), body).await {
            self.metrics.record_failure("store", "store");
            return Err(e.into());
        }
        self.metrics.record_store(size);

        debug!("Stored {} ({} bytes) via {}", key, size, self.store.name());
        Ok(size)
    }
}
