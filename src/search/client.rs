//! Image search API client

use super::models::{SearchPage, SearchQuery};
use crate::config::SearchSettings;
use crate::error::Result;
use crate::network::HttpClient;
use crate::secrets::Secret;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Source of paginated image results
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Number of results per page
    fn page_size(&self) -> u32 {
        crate::MAX_PAGE_SIZE
    }

    /// Fetch one page of results
    async fn fetch_page(&self, query: &SearchQuery) -> Result<SearchPage>;
}

/// Google Custom Search JSON API restricted to image results
pub struct CustomSearch {
    client: HttpClient,
    endpoint: Url,
    engine_id: String,
    api_key: Secret,
    page_size: u32,
    image_size: String,
    timeout: Duration,
}

impl CustomSearch {
    pub fn new(client: HttpClient, settings: &SearchSettings, api_key: Secret) -> anyhow::Result<Self> {
        Ok(Self {
            client,
            endpoint: Url::parse(&settings.endpoint)?,
            engine_id: settings.engine_id.clone(),
            api_key,
            page_size: settings.page_size,
            image_size: settings.image_size.clone(),
            timeout: settings.timeout(),
        })
    }

    /// Build the request URL; spaces in the phrase become `+`
    pub fn request_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", &query.phrase)
            .append_pair("num", &self.page_size.to_string())
            .append_pair("start", &query.offset.to_string())
            .append_pair("imgSize", &self.image_size)
            .append_pair("searchType", "image")
            .append_pair("cx", &self.engine_id)
            .append_pair("key", self.api_key.expose());
        url
    }
}

#[async_trait]
impl ImageSearch for CustomSearch {
    fn name(&self) -> &str {
        "google_custom_search"
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch_page(&self, query: &SearchQuery) -> Result<SearchPage> {
        let url = self.request_url(query);
        debug!(
            "Searching '{}' at offset {} with timeout {:?}",
            query.phrase, query.offset, self.timeout
        );

        let mut page: SearchPage = self.client.get_json(url.as_str(), self.timeout).await?;
        page.items.truncate(self.page_size as usize);
        Ok(page)
    }
}
