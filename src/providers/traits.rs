//! Provider traits and types

use crate::config::LocaleSettings;
use crate::network::HttpResponse;
use crate::results::SearchResult;
use async_trait::async_trait;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of search a provider is good at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderCategory {
    /// Neural engine that prefers conceptual phrasing
    Semantic,
    /// Engine that prefers literal keyword phrasing
    Keyword,
    Generic,
}

/// Per-call options passed through to the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Interface language code
    pub language: String,
    /// Country / region code
    pub region: String,
    /// Domains a provider should restrict itself to, if it supports that
    #[serde(default)]
    pub include_domains: Vec<String>,
    /// Earliest publication date, ISO 8601
    pub start_published_date: Option<String>,
}

impl SearchOptions {
    pub fn from_locale(locale: &LocaleSettings) -> Self {
        Self {
            language: locale.language.clone(),
            region: locale.region.clone(),
            include_domains: locale.preferred_domains.clone(),
            start_published_date: locale.start_published_date.clone(),
        }
    }
}

/// A search backend.
///
/// Implementations own their transport and their own timeout; the ordering and
/// fallback logic only ever sees this trait.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name, unique within a registry
    fn name(&self) -> &str;

    fn category(&self) -> ProviderCategory {
        ProviderCategory::Generic
    }

    /// Run a search. An empty vector is a valid answer, not an error.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        options: &SearchOptions,
    ) -> anyhow::Result<Vec<SearchResult>>;
}

/// Typed provider failures
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned HTTP status {status}")]
    Status { provider: String, status: u16 },
    #[error("{provider} rate limit or quota reached: {message}")]
    Quota { provider: String, message: String },
    #[error("{provider} is missing credentials")]
    MissingCredentials { provider: String },
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: String, message: String },
}

impl ProviderError {
    /// Classify a non-success HTTP response
    pub fn from_response(provider: &str, response: &HttpResponse) -> Self {
        let lowered = response.text.to_lowercase();
        if response.is_rate_limited()
            || response.status == 402
            || lowered.contains("quota")
            || lowered.contains("limit exceeded")
        {
            Self::Quota {
                provider: provider.to_string(),
                message: format!("HTTP {}", response.status),
            }
        } else {
            Self::Status {
                provider: provider.to_string(),
                status: response.status,
            }
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }
}

/// Parse a CSS selector, turning a malformed one into an error
pub(crate) fn selector(css: &'static str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid selector {}: {:?}", css, e))
}

/// Collapse whitespace in scraped text
pub(crate) fn clean_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
