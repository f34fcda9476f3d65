//! Exa neural search provider
//!
//! Exa ranks by meaning rather than keywords, so conceptual queries do best. Callers
//! going through the fallback manager get locale hints appended to the query first
//! (see [`crate::query::enhance_for_locale`]).

use super::traits::*;
use crate::config::ProviderSettings;
use crate::network::{HttpClient, HttpRequest};
use crate::results::SearchResult;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://api.exa.ai/search";

#[derive(Debug, Deserialize)]
struct ExaResponse {
    results: Option<Vec<ExaItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    text: Option<String>,
    score: Option<f64>,
    published_date: Option<String>,
}

pub struct Exa {
    name: String,
    client: HttpClient,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl Exa {
    pub fn new(settings: &ProviderSettings, client: HttpClient) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::MissingCredentials {
                provider: settings.name.clone(),
            })?;

        Ok(Self {
            name: settings.name.clone(),
            client,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            timeout: settings.request_timeout(30.0)?,
        })
    }
}

#[async_trait]
impl SearchProvider for Exa {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ProviderCategory {
        ProviderCategory::Semantic
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let mut body = json!({
            "query": query,
            "numResults": max_results,
            "useAutoprompt": true,
            "type": "neural",
            "contents": { "text": true },
        });
        if !options.include_domains.is_empty() {
            body["includeDomains"] = json!(options.include_domains);
        }
        if let Some(ref date) = options.start_published_date {
            body["startPublishedDate"] = json!(date);
        }

        let request = HttpRequest::post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .json(body)
            .timeout(self.timeout);

        let response = self.client.execute(request).await?;
        if !response.is_success() {
            let err = ProviderError::from_response(&self.name, &response);
            if err.is_quota() {
                warn!("Exa reached its usage limit: {}", err);
            }
            return Err(err.into());
        }

        let data: ExaResponse = response.json()?;
        let items = data.results.ok_or_else(|| ProviderError::InvalidResponse {
            provider: self.name.clone(),
            message: "missing results field".to_string(),
        })?;

        Ok(items
            .into_iter()
            .filter(|item| !item.url.is_empty())
            .map(|item| {
                let result = SearchResult::new(
                    item.title.unwrap_or_default(),
                    item.url,
                    item.text.unwrap_or_default(),
                    "exa",
                )
                .with_published_date(item.published_date.unwrap_or_default());
                match item.score {
                    Some(score) => result.with_score(score),
                    None => result,
                }
            })
            .collect())
    }
}
