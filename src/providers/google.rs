//! Google Custom Search JSON API provider

use super::traits::*;
use crate::config::ProviderSettings;
use crate::network::{HttpClient, HttpRequest};
use crate::results::SearchResult;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// The API refuses `num` above this
const MAX_RESULTS_PER_CALL: usize = 10;

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google keyword search through the Custom Search API
pub struct GoogleCustomSearch {
    name: String,
    client: HttpClient,
    base_url: String,
    api_key: String,
    cse_id: String,
    timeout: Duration,
}

impl GoogleCustomSearch {
    pub fn new(settings: &ProviderSettings, client: HttpClient) -> Result<Self> {
        let (Some(api_key), Some(cse_id)) = (settings.api_key.clone(), settings.cse_id.clone())
        else {
            return Err(ProviderError::MissingCredentials {
                provider: settings.name.clone(),
            }
            .into());
        };

        Ok(Self {
            name: settings.name.clone(),
            client,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            cse_id,
            timeout: settings.request_timeout(15.0)?,
        })
    }
}

#[async_trait]
impl SearchProvider for GoogleCustomSearch {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ProviderCategory {
        ProviderCategory::Keyword
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let mut request = HttpRequest::get(&self.base_url)
            .param("key", &self.api_key)
            .param("cx", &self.cse_id)
            .param("q", query)
            .param("num", max_results.clamp(1, MAX_RESULTS_PER_CALL))
            .param("safe", "off")
            .timeout(self.timeout);

        if !options.language.is_empty() {
            request = request.param("lr", format!("lang_{}", options.language));
        }
        if !options.region.is_empty() {
            request = request.param("gl", &options.region);
        }

        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(ProviderError::from_response(&self.name, &response).into());
        }

        let data: CustomSearchResponse = response.json()?;
        Ok(data
            .items
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .map(|item| SearchResult::new(item.title, item.link, item.snippet, "google"))
            .collect())
    }
}
