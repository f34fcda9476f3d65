//! Priority-ordered search with fallback

use crate::cache::{query_cache_key, SearchCache};
use crate::config::{LocaleSettings, SearchSettings};
use crate::providers::{ProviderCategory, ProviderRegistry, SearchOptions, SearchProvider};
use crate::query::{current_year, enhance_for_locale};
use crate::results::SearchResult;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs a query down the provider priority list until one answers.
///
/// The path is sequential on purpose: the first provider with a non-empty answer wins
/// and nothing is merged across providers.
pub struct FallbackSearchManager {
    registry: Arc<ProviderRegistry>,
    cache: SearchCache,
    locale: LocaleSettings,
    options: SearchOptions,
}

impl FallbackSearchManager {
    /// Create a new manager over `registry`
    pub fn new(registry: Arc<ProviderRegistry>, settings: &SearchSettings) -> Self {
        Self {
            registry,
            cache: SearchCache::new(settings.cache_ttl, settings.cache_capacity),
            options: SearchOptions::from_locale(&settings.locale),
            locale: settings.locale.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Options passed to every provider call
    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn locale(&self) -> &LocaleSettings {
        &self.locale
    }

    /// Search with automatic fallback across all available providers.
    ///
    /// Never fails: an empty vector means either nothing was found or every
    /// provider is currently degraded.
    pub async fn search_with_fallback(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        self.search_excluding(query, max_results, &[]).await
    }

    /// Same as [`Self::search_with_fallback`] but skipping the named providers
    pub async fn search_excluding(
        &self,
        query: &str,
        max_results: usize,
        excluded: &[String],
    ) -> Vec<SearchResult> {
        let cache_key = query_cache_key(query, max_results, excluded);
        if let Some(cached) = self.cache.get(&cache_key).await {
            info!(
                "Cache hit for '{}' ({} results from {})",
                query,
                cached.results.len(),
                cached.provider
            );
            return cached.results;
        }

        let providers: Vec<Arc<dyn SearchProvider>> = self
            .registry
            .ordered_available_providers()
            .into_iter()
            .filter(|p| !excluded.iter().any(|name| name == p.name()))
            .collect();

        for provider in providers {
            let name = provider.name().to_string();
            // counters may have moved since the order was computed
            if !self.registry.is_available(&name) {
                continue;
            }

            let provider_query = self.query_for(provider.as_ref(), query);
            info!("Searching with {}: {}", name, provider_query);
            let start = Instant::now();

            match provider
                .search(&provider_query, max_results, &self.options)
                .await
            {
                Ok(results) if !results.is_empty() => {
                    info!(
                        "{}: {} results in {:?}",
                        name,
                        results.len(),
                        start.elapsed()
                    );
                    self.cache.insert(cache_key, results.clone(), &name).await;
                    return results;
                }
                Ok(_) => {
                    warn!("{}: 0 results, trying next provider", name);
                }
                Err(e) => {
                    error!("Error in {}: {}", name, e);
                    self.registry.record_error(&name);
                }
            }
        }

        error!("All search providers failed for '{}'", query);
        Vec::new()
    }

    /// Semantic providers get locale hints appended
    pub(super) fn query_for(&self, provider: &dyn SearchProvider, query: &str) -> String {
        match provider.category() {
            ProviderCategory::Semantic => {
                let enhanced = enhance_for_locale(query, &self.locale, current_year());
                debug!("Enhanced query for {}: {}", provider.name(), enhanced);
                enhanced
            }
            _ => query.to_string(),
        }
    }

    /// Clear the search cache
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Search cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{Behavior, ScriptedProvider};
    use crate::providers::ProviderConfig;

    fn manager(providers: Vec<(Arc<ScriptedProvider>, u32, u32)>) -> FallbackSearchManager {
        let mut registry = ProviderRegistry::new();
        for (provider, priority, max_errors) in providers {
            registry.register(provider, ProviderConfig::new(priority, max_errors));
        }
        FallbackSearchManager::new(Arc::new(registry), &SearchSettings::default())
    }

    #[tokio::test]
    async fn test_first_non_empty_wins() {
        let first = ScriptedProvider::new("google", Behavior::Results(3));
        let second = ScriptedProvider::new("bing", Behavior::Results(5));
        let manager = manager(vec![(first.clone(), 1, 3), (second.clone(), 2, 3)]);

        let results = manager.search_with_fallback("electric vehicles", 10).await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.source == "google"));
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_result_falls_through_without_error() {
        let empty = ScriptedProvider::new("google", Behavior::Empty);
        let backup = ScriptedProvider::new("bing", Behavior::Results(2));
        let manager = manager(vec![(empty.clone(), 1, 3), (backup.clone(), 2, 3)]);

        let results = manager.search_with_fallback("q", 10).await;

        assert_eq!(results.len(), 2);
        assert_eq!(manager.registry().error_count("google"), Some(0));
    }

    #[tokio::test]
    async fn test_failure_is_counted_and_skipped() {
        let broken = ScriptedProvider::new("serper", Behavior::Fail);
        let backup = ScriptedProvider::new("bing", Behavior::Results(1));
        let manager = manager(vec![(broken.clone(), 1, 2), (backup.clone(), 2, 3)]);

        assert_eq!(manager.search_with_fallback("a", 10).await.len(), 1);
        assert_eq!(manager.registry().error_count("serper"), Some(1));

        assert_eq!(manager.search_with_fallback("b", 10).await.len(), 1);
        assert!(!manager.registry().is_available("serper"));

        // excluded now, so no third call
        manager.search_with_fallback("c", 10).await;
        assert_eq!(broken.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_empty() {
        let manager = manager(vec![
            (ScriptedProvider::new("a", Behavior::Fail), 1, 3),
            (ScriptedProvider::new("b", Behavior::Empty), 2, 3),
        ]);
        assert!(manager.search_with_fallback("q", 10).await.is_empty());

        let empty_registry = manager_with_nothing();
        assert!(empty_registry.search_with_fallback("q", 10).await.is_empty());
    }

    fn manager_with_nothing() -> FallbackSearchManager {
        FallbackSearchManager::new(Arc::new(ProviderRegistry::new()), &SearchSettings::default())
    }

    #[tokio::test]
    async fn test_cache_within_ttl() {
        let provider = ScriptedProvider::new("google", Behavior::Results(4));
        let manager = manager(vec![(provider.clone(), 1, 3)]);

        let first = manager.search_with_fallback("fintech", 10).await;
        let second = manager.search_with_fallback("fintech", 10).await;

        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 1);

        // different max_results is a different key
        manager.search_with_fallback("fintech", 5).await;
        assert_eq!(provider.call_count(), 2);

        manager.clear_cache();
        manager.search_with_fallback("fintech", 10).await;
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_outcome_is_not_cached() {
        let provider = ScriptedProvider::new("google", Behavior::Empty);
        let manager = manager(vec![(provider.clone(), 1, 3)]);

        manager.search_with_fallback("q", 10).await;
        manager.search_with_fallback("q", 10).await;
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_semantic_provider_gets_locale_hints() {
        let semantic =
            ScriptedProvider::with_category("exa", ProviderCategory::Semantic, Behavior::Results(1));
        let manager = manager(vec![(semantic.clone(), 1, 3)]);

        manager.search_with_fallback("electric vehicles", 10).await;

        let sent = semantic.last_query().unwrap();
        assert!(sent.starts_with("electric vehicles Brasil"));
        assert!(sent.ends_with(&current_year().to_string()));
    }

    #[tokio::test]
    async fn test_excluded_providers_are_skipped() {
        let exa = ScriptedProvider::new("exa", Behavior::Results(1));
        let bing = ScriptedProvider::new("bing", Behavior::Results(2));
        let manager = manager(vec![(exa.clone(), 1, 3), (bing.clone(), 2, 3)]);

        let results = manager
            .search_excluding("q", 10, &["exa".to_string()])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(exa.call_count(), 0);
    }
}
