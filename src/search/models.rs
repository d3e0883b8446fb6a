//! Search data models

use serde::{Deserialize, Serialize};

/// One page request for a phrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search phrase as configured
    pub phrase: String,
    /// Zero-based index of the first result
    pub offset: u32,
}

impl SearchQuery {
    pub fn new(phrase: impl Into<String>, offset: u32) -> Self {
        Self {
            phrase: phrase.into(),
            offset,
        }
    }
}

/// One page of image search results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Response kind reported by the API
    #[serde(default)]
    pub kind: String,
    /// Results in ranking order
    #[serde(default)]
    pub items: Vec<SearchResultItem>,
}

impl SearchPage {
    pub fn with_items(items: Vec<SearchResultItem>) -> Self {
        Self {
            kind: String::new(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A single image hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    #[serde(default)]
    pub title: String,
    /// Fetchable image URL
    pub link: String,
}

impl SearchResultItem {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}
