//! Fan-out search over every available provider

use super::FallbackSearchManager;
use crate::providers::{ProviderCategory, ProviderStatus, SearchProvider};
use crate::results::{SearchResponse, SearchResult};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a parallel search collected, across all queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelSearchResult {
    pub total_queries: usize,
    /// Non-empty results keyed by provider name
    pub results_by_provider: BTreeMap<String, Vec<SearchResult>>,
    /// Every result in query order, priority providers first within a query
    pub aggregated_results: Vec<SearchResult>,
    /// Results from semantic providers
    pub semantic_results: Vec<SearchResult>,
    /// Results from keyword providers
    pub keyword_results: Vec<SearchResult>,
    pub metadata: ParallelSearchMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelSearchMetadata {
    pub timestamp: DateTime<Utc>,
    pub providers_status: Vec<ProviderStatus>,
}

impl ParallelSearchResult {
    fn new(total_queries: usize) -> Self {
        Self {
            total_queries,
            results_by_provider: BTreeMap::new(),
            aggregated_results: Vec::new(),
            semantic_results: Vec::new(),
            keyword_results: Vec::new(),
            metadata: ParallelSearchMetadata {
                timestamp: Utc::now(),
                providers_status: Vec::new(),
            },
        }
    }

    fn absorb(&mut self, category: ProviderCategory, response: SearchResponse) {
        if response.results.is_empty() {
            return;
        }
        match category {
            ProviderCategory::Semantic => {
                self.semantic_results.extend_from_slice(&response.results)
            }
            ProviderCategory::Keyword => {
                self.keyword_results.extend_from_slice(&response.results)
            }
            ProviderCategory::Generic => {}
        }
        self.aggregated_results.extend_from_slice(&response.results);
        self.results_by_provider
            .entry(response.provider)
            .or_default()
            .extend(response.results);
    }
}

fn is_priority(provider: &dyn SearchProvider) -> bool {
    matches!(
        provider.category(),
        ProviderCategory::Semantic | ProviderCategory::Keyword
    )
}

impl FallbackSearchManager {
    /// Run each query on every available provider at once.
    ///
    /// Semantic and keyword providers run first as one concurrent wave; the remaining
    /// providers follow as a second wave. Failures are counted in the registry and
    /// contribute nothing. Results are never deduplicated and nothing is cached.
    pub async fn search_parallel(
        &self,
        queries: &[String],
        max_results: usize,
    ) -> ParallelSearchResult {
        let mut outcome = ParallelSearchResult::new(queries.len());

        for query in queries {
            let (priority, secondary): (Vec<_>, Vec<_>) = self
                .registry()
                .ordered_available_providers()
                .into_iter()
                .partition(|p| is_priority(p.as_ref()));

            info!(
                "Parallel search for '{}': {} priority, {} secondary providers",
                query,
                priority.len(),
                secondary.len()
            );

            for wave in [priority, secondary] {
                for (category, response) in self.search_wave(&wave, query, max_results).await {
                    if !response.success {
                        warn!(
                            "{}: no results for '{}'{}",
                            response.provider,
                            query,
                            response
                                .error
                                .as_deref()
                                .map(|e| format!(" ({})", e))
                                .unwrap_or_default()
                        );
                    }
                    outcome.absorb(category, response);
                }
            }
        }

        outcome.metadata.timestamp = Utc::now();
        outcome.metadata.providers_status = self.registry().provider_status();
        outcome
    }

    async fn search_wave(
        &self,
        providers: &[Arc<dyn SearchProvider>],
        query: &str,
        max_results: usize,
    ) -> Vec<(ProviderCategory, SearchResponse)> {
        let calls = providers.iter().map(|provider| async move {
            let provider_query = self.query_for(provider.as_ref(), query);
            let response = self
                .registry()
                .search(provider.name(), &provider_query, max_results, self.options())
                .await;
            (provider.category(), response)
        });
        join_all(calls).await
    }
}
