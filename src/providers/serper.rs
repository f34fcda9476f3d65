//! Serper (Google results over a JSON API)

use super::traits::*;
use crate::config::ProviderSettings;
use crate::network::{HttpClient, HttpRequest};
use crate::results::SearchResult;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev/search";

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperItem>,
}

#[derive(Debug, Deserialize)]
struct SerperItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    date: Option<String>,
}

pub struct Serper {
    name: String,
    client: HttpClient,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl Serper {
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
            timeout: settings.request_timeout(15.0)?,
        })
    }
}

#[async_trait]
impl SearchProvider for Serper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let request = HttpRequest::post(&self.base_url)
            .header("X-API-KEY", &self.api_key)
            .json(json!({
                "q": query,
                "gl": options.region,
                "hl": options.language,
                "num": max_results,
            }))
            .timeout(self.timeout);

        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(ProviderError::from_response(&self.name, &response).into());
        }

        let data: SerperResponse = response.json()?;
        Ok(data
            .organic
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .take(max_results)
            .map(|item| {
                let result = SearchResult::new(item.title, item.link, item.snippet, "serper");
                match item.date {
                    Some(date) => result.with_published_date(date),
                    None => result,
                }
            })
            .collect())
    }
}
