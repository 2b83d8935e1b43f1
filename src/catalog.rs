//! Catalog queries: categories and shows
//!
//! Builds the resource keys for each catalog query and fetches them through
//! a `CachedFetcher`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::fetch::{CachedFetcher, FetchResult, ResourceKey};

/// Number of shows requested per listing
const PAGE_LIMIT: u32 = 10;

/// A catalog category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Fields this client does not interpret, kept so cached entries stay complete
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A show (podcast) in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Resource keys for catalog queries
pub mod keys {
    use super::*;

    pub fn categories() -> ResourceKey {
        ResourceKey::new("categories")
    }

    pub fn show(id: &str) -> ResourceKey {
        ResourceKey::new(format!("shows/{}", urlencoded(id)))
    }

    pub fn search(term: &str) -> ResourceKey {
        ResourceKey::new(format!("shows?limit={}&term={}", PAGE_LIMIT, urlencoded(term)))
    }

    pub fn by_category(category_id: &str) -> ResourceKey {
        ResourceKey::new(format!(
            "shows?limit={}&categoryId={}",
            PAGE_LIMIT,
            urlencoded(category_id)
        ))
    }

    pub fn search_in_category(category_id: &str, term: &str) -> ResourceKey {
        ResourceKey::new(format!(
            "shows?limit={}&categoryId={}&term={}",
            PAGE_LIMIT,
            urlencoded(category_id),
            urlencoded(term)
        ))
    }
}

/// Read-only access to the catalog through the cache
#[derive(Debug, Clone)]
pub struct CatalogService {
    fetcher: Arc<CachedFetcher>,
}

impl CatalogService {
    pub fn new(fetcher: Arc<CachedFetcher>) -> Self {
        Self { fetcher }
    }

    /// All categories
    pub async fn categories(&self) -> FetchResult<Vec<Category>> {
        self.fetcher.fetch_json(&keys::categories()).await
    }

    /// A single show by id
    pub async fn show(&self, id: &str) -> FetchResult<Show> {
        self.fetcher.fetch_json(&keys::show(id)).await
    }

    /// The first page of all shows
    pub async fn shows(&self) -> FetchResult<Vec<Show>> {
        self.search("").await
    }

    /// Shows whose title matches `term`
    pub async fn search(&self, term: &str) -> FetchResult<Vec<Show>> {
        self.fetcher.fetch_json(&keys::search(term)).await
    }

    /// Shows in a category matching `term`
    pub async fn search_in_category(&self, category_id: &str, term: &str) -> FetchResult<Vec<Show>> {
        self.fetcher
            .fetch_json(&keys::search_in_category(category_id, term))
            .await
    }

    /// Shows in a category
    ///
    /// Unlike the other listings this never reports absence: nothing
    /// obtainable is an empty list.
    pub async fn shows_by_category(&self, category_id: &str) -> Vec<Show> {
        self.fetcher
            .fetch_json(&keys::by_category(category_id))
            .await
            .into_value()
            .unwrap_or_default()
    }
}

/// Percent-encodes a string for use in a path segment or query parameter
fn urlencoded(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{:02X}", byte);
        }
    }
    encoded
}
