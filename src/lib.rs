//! image-harvester: bulk image harvesting from an image search API into object storage
//!
//! A run walks a list of search phrases, requests a fixed number of result
//! pages for each, downloads every image hit and uploads it under a
//! deterministic key.

pub mod config;
pub mod error;
pub mod harvest;
pub mod metrics;
pub mod network;
pub mod search;
pub mod secrets;
pub mod storage;

pub use config::Settings;
pub use error::HarvestError;
pub use harvest::{Harvester, RunReport};
pub use search::{ImageSearch, SearchQuery};
pub use storage::{ObjectStore, StorageKey};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for search requests in seconds
pub const DEFAULT_TIMEOUT: u64 = 10;

/// Largest page the search API returns
pub const MAX_PAGE_SIZE: u32 = 10;
