//! Settings structures for the harvester configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main settings structure matching harvest.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub secrets: SecretsSettings,
    pub storage: StorageSettings,
    pub outgoing: OutgoingSettings,
    pub harvest: HarvestSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (HARVEST_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("HARVEST_API_KEY") {
            self.search.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("HARVEST_BUCKET") {
            self.storage.bucket = val;
        }
        if let Ok(val) = std::env::var("HARVEST_STORAGE_ENDPOINT") {
            self.storage.endpoint = val;
        }
        if let Ok(val) = std::env::var("HARVEST_STORAGE_REGION") {
            self.storage.region = val;
        }
        if let Ok(val) = std::env::var("HARVEST_SECRETS_ENDPOINT") {
            self.secrets.endpoint = Some(val);
        }
        if let Ok(val) = std::env::var("HARVEST_CONCURRENCY") {
            if let Ok(concurrency) = val.parse() {
                self.harvest.concurrency = concurrency;
            }
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.harvest.concurrency == 0 {
            bail!("harvest.concurrency must be greater than zero");
        }
        if !(1..=crate::MAX_PAGE_SIZE).contains(&self.search.page_size) {
            bail!(
                "search.page_size must be between 1 and {}",
                crate::MAX_PAGE_SIZE
            );
        }
        if let Some(job) = self.harvest.jobs.iter().find(|j| j.phrase.trim().is_empty()) {
            bail!("job with {} pages has an empty phrase", job.page_count);
        }
        if self.storage.bucket.is_empty() {
            bail!("storage.bucket must not be empty");
        }
        if self.storage.backend == StorageBackend::Http {
            match self.storage.auth {
                StorageAuth::SigV4 if self.storage.region.is_empty() => {
                    bail!("storage.region is required for sigv4 signing")
                }
                StorageAuth::Bearer if self.storage.token_param.is_none() => {
                    bail!("storage.token_param is required for bearer auth")
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Image search API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Search API endpoint
    pub endpoint: String,
    /// Custom search engine identifier (cx)
    pub engine_id: String,
    /// Literal API key; skips the secret lookup when set
    pub api_key: Option<String>,
    /// Secret parameter holding the API key
    pub api_key_param: String,
    /// Results requested per page
    pub page_size: u32,
    /// Image size filter
    pub image_size: String,
    /// Search request timeout in seconds
    pub timeout: f64,
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            engine_id: "011992137466501229235:-0nok_uw7ly".to_string(),
            api_key: None,
            api_key_param: "google_api_key".to_string(),
            page_size: crate::MAX_PAGE_SIZE,
            image_size: "medium".to_string(),
            timeout: crate::DEFAULT_TIMEOUT as f64,
        }
    }
}

/// Secret backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretBackend {
    /// Read secrets from environment variables
    #[default]
    Env,
    /// Query an HTTP parameter store
    Http,
}

/// Secret retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsSettings {
    pub backend: SecretBackend,
    /// Parameter store endpoint (http backend)
    pub endpoint: Option<String>,
    /// Ask the parameter store to decrypt the value
    pub with_decryption: bool,
    /// Prefix prepended to environment variable names (env backend)
    pub env_prefix: String,
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            backend: SecretBackend::Env,
            endpoint: None,
            with_decryption: true,
            env_prefix: String::new(),
        }
    }
}

/// Object storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Http,
    Filesystem,
}

/// How the http backend authenticates its uploads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageAuth {
    /// AWS Signature Version 4 with an access key pair
    #[default]
    #[serde(rename = "sigv4")]
    SigV4,
    /// `Authorization: Bearer` token, for gateways in front of a bucket
    #[serde(rename = "bearer")]
    Bearer,
    #[serde(rename = "none")]
    Anonymous,
}

/// Canned access policy applied to uploaded objects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPolicy {
    #[default]
    Private,
    PublicRead,
}

impl AccessPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
        }
    }
}

/// Object storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Base URL of the object store (http backend)
    pub endpoint: String,
    /// Target bucket
    pub bucket: String,
    /// First path segment of every key
    pub base_prefix: String,
    /// Access policy for written objects
    pub acl: AccessPolicy,
    /// Root directory (filesystem backend)
    pub root: String,
    /// Request authentication (http backend)
    pub auth: StorageAuth,
    /// Signing region for sigv4
    pub region: String,
    /// Secret parameter holding the access key id (sigv4)
    pub access_key_param: String,
    /// Secret parameter holding the secret access key (sigv4)
    pub secret_key_param: String,
    /// Secret parameter holding a session token; used when present (sigv4)
    pub session_token_param: Option<String>,
    /// Secret parameter holding a bearer token (bearer)
    pub token_param: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Http,
            endpoint: "https://s3.us-east-1.amazonaws.com".to_string(),
            bucket: "treefinder".to_string(),
            base_prefix: "validation".to_string(),
            acl: AccessPolicy::Private,
            root: "harvest-data".to_string(),
            auth: StorageAuth::SigV4,
            region: "us-east-1".to_string(),
            access_key_param: "aws_access_key_id".to_string(),
            secret_key_param: "aws_secret_access_key".to_string(),
            session_token_param: Some("aws_session_token".to_string()),
            token_param: None,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// TCP connect timeout in seconds
    pub connect_timeout: f64,
    /// Image download timeout in seconds (none = wait indefinitely)
    pub image_timeout: Option<f64>,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Appended to the generated user agent
    pub useragent_suffix: Option<String>,
}

impl OutgoingSettings {
    pub fn image_timeout(&self) -> Option<Duration> {
        self.image_timeout.map(Duration::from_secs_f64)
    }
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            connect_timeout: 10.0,
            image_timeout: None,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            useragent_suffix: None,
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// One phrase to harvest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Search term
    pub phrase: String,
    /// Number of result pages to harvest
    #[serde(default = "default_page_count")]
    pub page_count: u32,
}

impl JobConfig {
    pub fn new(phrase: impl Into<String>, page_count: u32) -> Self {
        Self {
            phrase: phrase.into(),
            page_count,
        }
    }

    /// Offsets of every page in this job, in request order
    pub fn offsets(&self, page_size: u32) -> Vec<u32> {
        (0..self.page_count).map(|page| page * page_size).collect()
    }
}

fn default_page_count() -> u32 {
    3
}

/// Harvest run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    /// Worker tasks per page
    pub concurrency: usize,
    /// Jobs, run in order
    pub jobs: Vec<JobConfig>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            concurrency: crate::MAX_PAGE_SIZE as usize,
            jobs: vec![JobConfig::new("quercus lobata", default_page_count())],
        }
    }
}
