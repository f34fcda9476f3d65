//! Dual-channel search coordination
//!
//! A semantic engine and a keyword engine want opposite phrasings of the same question,
//! so each gets its own derived query. Both run concurrently next to a residual search
//! over every other provider. Results stay in per-channel buckets.

use crate::autosave::{save_error_quietly, save_stage_quietly, AutoSave, CATEGORY_WEB_RESEARCH};
use crate::config::CoordinatorSettings;
use crate::query::{current_year, domain_from_context, keyword_query, semantic_query};
use crate::results::{SearchResponse, SearchResult};
use crate::search::FallbackSearchManager;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info};

const STAGE_QUERIES: &str = "simultaneous_queries";
const STAGE_CONSOLIDATED: &str = "simultaneous_search_consolidated";

/// Tag used on residual responses, which may come from any provider
const RESIDUAL_PROVIDER: &str = "residual";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Semantic,
    Keyword,
    Residual,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Semantic => "semantic",
            Channel::Keyword => "keyword",
            Channel::Residual => "residual",
        }
    }

    fn stage(&self) -> &'static str {
        match self {
            Channel::Semantic => "semantic_results",
            Channel::Keyword => "keyword_results",
            Channel::Residual => "residual_results",
        }
    }
}

/// The three query strings sent out for one base query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedQueries {
    pub base: String,
    pub semantic: String,
    pub keyword: String,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub semantic_count: usize,
    pub keyword_count: usize,
    pub residual_count: usize,
    pub total_results: usize,
    /// Wall-clock seconds for the whole coordinated search
    pub search_time: f64,
}

/// Per-channel results of one coordinated search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedSearchResult {
    pub base_query: String,
    pub queries: DerivedQueries,
    pub semantic: Vec<SearchResult>,
    pub keyword: Vec<SearchResult>,
    pub residual: Vec<SearchResult>,
    pub statistics: SearchStatistics,
}

impl AggregatedSearchResult {
    fn new(queries: DerivedQueries) -> Self {
        Self {
            base_query: queries.base.clone(),
            queries,
            semantic: Vec::new(),
            keyword: Vec::new(),
            residual: Vec::new(),
            statistics: SearchStatistics::default(),
        }
    }

    pub fn channel(&self, channel: Channel) -> &[SearchResult] {
        match channel {
            Channel::Semantic => &self.semantic,
            Channel::Keyword => &self.keyword,
            Channel::Residual => &self.residual,
        }
    }

    fn place(&mut self, channel: Channel, results: Vec<SearchResult>) {
        match channel {
            Channel::Semantic => self.semantic = results,
            Channel::Keyword => self.keyword = results,
            Channel::Residual => self.residual = results,
        }
    }

    fn tally(&mut self, search_time: f64) {
        let semantic_count = self.semantic.len();
        let keyword_count = self.keyword.len();
        let residual_count = self.residual.len();
        self.statistics = SearchStatistics {
            semantic_count,
            keyword_count,
            residual_count,
            total_results: semantic_count + keyword_count + residual_count,
            search_time,
        };
    }
}

/// Runs the semantic, keyword and residual channels side by side
pub struct DualChannelSearchCoordinator {
    fallback: Arc<FallbackSearchManager>,
    autosave: Arc<dyn AutoSave>,
    settings: CoordinatorSettings,
}

impl DualChannelSearchCoordinator {
    pub fn new(
        fallback: Arc<FallbackSearchManager>,
        autosave: Arc<dyn AutoSave>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            fallback,
            autosave,
            settings,
        }
    }

    /// Derive the channel queries for `base_query`
    pub fn derive_queries(&self, base_query: &str, context: &Map<String, Value>) -> DerivedQueries {
        let domain = domain_from_context(context, &self.settings.domain_key);
        DerivedQueries {
            base: base_query.to_string(),
            semantic: semantic_query(base_query, domain.as_deref()),
            keyword: keyword_query(
                base_query,
                domain.as_deref(),
                self.fallback.locale(),
                current_year(),
            ),
            domain,
        }
    }

    /// Search all channels concurrently and wait for every one of them.
    ///
    /// A failing channel comes back empty; the call itself never fails.
    pub async fn execute_simultaneous_distinct_search(
        &self,
        base_query: &str,
        context: &Map<String, Value>,
    ) -> AggregatedSearchResult {
        let start = Instant::now();
        let queries = self.derive_queries(base_query, context);
        save_stage_quietly(
            self.autosave.as_ref(),
            None,
            STAGE_QUERIES,
            &queries,
            CATEGORY_WEB_RESEARCH,
        );

        let mut tasks: Vec<(Channel, String, JoinHandle<SearchResponse>)> = Vec::with_capacity(3);

        if let Some(handle) = self.spawn_direct(
            &self.settings.semantic_provider,
            &queries.semantic,
            self.settings.semantic_max_results,
        ) {
            tasks.push((Channel::Semantic, queries.semantic.clone(), handle));
        }
        if let Some(handle) = self.spawn_direct(
            &self.settings.keyword_provider,
            &queries.keyword,
            self.settings.keyword_max_results,
        ) {
            tasks.push((Channel::Keyword, queries.keyword.clone(), handle));
        }
        tasks.push((
            Channel::Residual,
            queries.base.clone(),
            self.spawn_residual(&queries.base),
        ));

        info!(
            "Running {} search channels for '{}'",
            tasks.len(),
            base_query
        );

        let (labels, handles): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .map(|(channel, query, handle)| ((channel, query), handle))
            .unzip();
        let outcomes = join_all(handles).await;

        let mut aggregate = AggregatedSearchResult::new(queries);
        for ((channel, query), outcome) in labels.into_iter().zip(outcomes) {
            let response = match outcome {
                Ok(response) => response,
                Err(e) => {
                    error!("{} channel crashed: {}", channel.as_str(), e);
                    save_error_quietly(
                        self.autosave.as_ref(),
                        None,
                        channel.stage(),
                        &e.to_string(),
                        &json!({ "channel": channel, "query": query }),
                    );
                    SearchResponse::failed(channel.as_str(), query, e.to_string())
                }
            };

            info!(
                "{} channel: {} results",
                channel.as_str(),
                response.result_count()
            );
            save_stage_quietly(
                self.autosave.as_ref(),
                None,
                channel.stage(),
                &response,
                CATEGORY_WEB_RESEARCH,
            );
            aggregate.place(channel, response.results);
        }

        aggregate.tally(start.elapsed().as_secs_f64());
        info!(
            "Coordinated search done: {} semantic, {} keyword, {} residual in {:.2}s",
            aggregate.statistics.semantic_count,
            aggregate.statistics.keyword_count,
            aggregate.statistics.residual_count,
            aggregate.statistics.search_time
        );
        save_stage_quietly(
            self.autosave.as_ref(),
            None,
            STAGE_CONSOLIDATED,
            &aggregate,
            CATEGORY_WEB_RESEARCH,
        );

        aggregate
    }

    /// Spawn a direct call to one provider, or `None` when it is not available
    fn spawn_direct(
        &self,
        provider: &str,
        query: &str,
        max_results: usize,
    ) -> Option<JoinHandle<SearchResponse>> {
        let registry = self.fallback.registry().clone();
        if !registry.is_available(provider) {
            info!("Provider {} unavailable, skipping its channel", provider);
            return None;
        }

        let provider = provider.to_string();
        let query = query.to_string();
        let options = self.fallback.options().clone();
        Some(tokio::spawn(async move {
            registry
                .search(&provider, &query, max_results, &options)
                .await
        }))
    }

    /// Spawn the fallback search over every provider not owning a channel
    fn spawn_residual(&self, query: &str) -> JoinHandle<SearchResponse> {
        let fallback = self.fallback.clone();
        let query = query.to_string();
        let max_results = self.settings.residual_max_results;
        let excluded = vec![
            self.settings.semantic_provider.clone(),
            self.settings.keyword_provider.clone(),
        ];
        tokio::spawn(async move {
            let results = fallback
                .search_excluding(&query, max_results, &excluded)
                .await;
            SearchResponse::ok(RESIDUAL_PROVIDER, query, results)
        })
    }
}
