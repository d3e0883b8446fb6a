//! Error types shared across the harvesting pipeline

use crate::secrets::ConfigError;
use crate::storage::StoreError;
use thiserror::Error;

/// Errors surfaced by the search, fetch and store stages
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("malformed search response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("worker task failed: {0}")]
    Worker(String),
}

impl HarvestError {
    /// Build a network error, stripping the query string so API keys stay out of logs
    pub fn network(url: &str, source: reqwest::Error) -> Self {
        Self::Network {
            url: redact(url),
            source: source.without_url(),
        }
    }

    pub fn status(url: &str, status: u16) -> Self {
        Self::HttpStatus {
            url: redact(url),
            status,
        }
    }

    /// Short category name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Network { .. } | Self::HttpStatus { .. } => "network",
            Self::Decode(_) => "decode",
            Self::Store(_) => "store",
            Self::Worker(_) => "worker",
        }
    }
}

fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?…", base),
        None => url.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
