//! Result type definitions

use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum snippet length kept on a result, in characters
pub const MAX_SNIPPET_CHARS: usize = 300;

/// A single search result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The title of the result
    pub title: String,
    /// The URL of the result
    pub url: String,
    /// Content snippet, at most `MAX_SNIPPET_CHARS` characters
    pub snippet: String,
    /// Tag of the provider that produced this result
    pub source: String,
    /// Provider relevance score, if the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Publication date as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

impl SearchResult {
    /// Create a new result, truncating the snippet
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl AsRef<str>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: truncate_chars(snippet.as_ref(), MAX_SNIPPET_CHARS),
            source: source.into(),
            score: None,
            published_date: None,
        }
    }

    /// Attach a relevance score
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Attach a publication date
    pub fn with_published_date(mut self, date: impl Into<String>) -> Self {
        let date = date.into();
        if !date.is_empty() {
            self.published_date = Some(date);
        }
        self
    }

    /// Get the hostname from the URL
    pub fn hostname(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }
}

/// Outcome of one provider call, tagged with the provider and query used
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub provider: String,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    /// Response carrying results; success means at least one result
    pub fn ok(provider: impl Into<String>, query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        let success = !results.is_empty();
        Self {
            provider: provider.into(),
            query: query.into(),
            results,
            success,
            error: None,
        }
    }

    /// Failed response with an empty result list
    pub fn failed(
        provider: impl Into<String>,
        query: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            query: query.into(),
            results: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }
}

/// Truncate a string to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
