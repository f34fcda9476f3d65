//! Caching module for SearchRelay
//!
//! Caches the first non-empty answer of the fallback chain per (query, max_results).
//! Entries expire after the configured TTL; a stale answer within the TTL is accepted.

use crate::results::SearchResult;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// A cached result set and where it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSearch {
    pub results: Vec<SearchResult>,
    /// Provider that produced the results
    pub provider: String,
    pub stored_at: DateTime<Utc>,
}

/// Cache for search results
pub struct SearchCache {
    cache: Cache<String, CachedSearch>,
}

impl SearchCache {
    /// Create a new result cache with specified TTL
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        Self { cache }
    }

    /// Get a cached result
    pub async fn get(&self, key: &str) -> Option<CachedSearch> {
        self.cache.get(key).await
    }

    /// Store a result in cache
    pub async fn insert(&self, key: String, results: Vec<SearchResult>, provider: &str) {
        let entry = CachedSearch {
            results,
            provider: provider.to_string(),
            stored_at: Utc::now(),
        };
        self.cache.insert(key, entry).await;
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(3600, 10_000)
    }
}

/// Generate a cache key for a search.
///
/// `excluded` lists providers left out of the chain; it is part of the key because
/// the same query over a different provider set is a different search.
pub fn query_cache_key(query: &str, max_results: usize, excluded: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update([0u8]);
    hasher.update(max_results.to_string().as_bytes());
    for name in excluded {
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_result_cache() {
        let cache = SearchCache::new(60, 100);
        let results = vec![SearchResult::new("t", "https://a.com", "s", "bing")];
        cache.insert("key".to_string(), results.clone(), "bing").await;

        let cached = cache.get("key").await.unwrap();
        assert_eq!(cached.results, results);
        assert_eq!(cached.provider, "bing");

        cache.clear();
        assert!(cache.get("key").await.is_none());
    }

    #[test]
    fn test_cache_key() {
        let a = query_cache_key("electric vehicles", 10, &[]);
        assert_eq!(a, query_cache_key("electric vehicles", 10, &[]));
        assert_ne!(a, query_cache_key("electric vehicles", 5, &[]));
        assert_ne!(a, query_cache_key("electric vehicles", 10, &["exa".to_string()]));
        assert_ne!(query_cache_key("ab", 1, &[]), query_cache_key("a", 11, &[]));
    }
}
