//! DuckDuckGo HTML search (scraping)

use super::traits::*;
use crate::config::ProviderSettings;
use crate::network::{HttpClient, HttpRequest};
use crate::results::SearchResult;
use anyhow::Result;
use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com/html/";

pub struct DuckDuckGo {
    name: String,
    client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl DuckDuckGo {
    pub fn new(settings: &ProviderSettings, client: HttpClient) -> Result<Self> {
        Ok(Self {
            name: settings.name.clone(),
            client,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: settings.request_timeout(15.0)?,
        })
    }

    /// Unwrap `//duckduckgo.com/l/?uddg=<target>` redirect links
    fn resolve_link(href: &str) -> Option<String> {
        if href.starts_with("http") && !href.contains("duckduckgo.com/l/") {
            return Some(href.to_string());
        }

        let absolute = if href.starts_with("//") {
            format!("https:{}", href)
        } else {
            href.to_string()
        };

        Url::parse(&absolute)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .filter(|target| target.starts_with("http"))
    }

    fn parse_results(&self, html: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);
        let result_selector = selector("div.result")?;
        let title_selector = selector("a.result__a")?;
        let snippet_selector = selector(".result__snippet")?;

        let mut results = Vec::new();
        for element in document.select(&result_selector).take(max_results) {
            let Some(title_elem) = element.select(&title_selector).next() else {
                continue;
            };

            let title = clean_text(title_elem.text());
            let Some(url) = title_elem.value().attr("href").and_then(Self::resolve_link) else {
                continue;
            };
            if title.is_empty() {
                continue;
            }

            let snippet = element
                .select(&snippet_selector)
                .next()
                .map(|s| clean_text(s.text()))
                .unwrap_or_default();

            results.push(SearchResult::new(title, url, snippet, "duckduckgo"));
        }

        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let mut request = HttpRequest::get(&self.base_url)
            .param("q", query)
            .timeout(self.timeout);

        if !options.region.is_empty() && !options.language.is_empty() {
            request = request.param("kl", format!("{}-{}", options.region, options.language));
        }

        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(ProviderError::from_response(&self.name, &response).into());
        }

        self.parse_results(&response.text, max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="result">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fev&rut=x">EV market</a>
          <a class="result__snippet">Growth of <b>EV</b> sales</a>
        </div>
        <div class="result">
          <a class="result__a" href="https://direct.example.org/">Direct</a>
        </div>
        <div class="result">
          <a class="result__a" href="/settings">Settings</a>
        </div>
    "#;

    fn ddg() -> DuckDuckGo {
        let settings = ProviderSettings {
            name: "duckduckgo".to_string(),
            ..Default::default()
        };
        DuckDuckGo::new(&settings, HttpClient::new().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_results() {
        let results = ddg().parse_results(PAGE, 10).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://example.com/ev");
        assert_eq!(results[0].snippet, "Growth of EV sales");
        assert_eq!(results[1].url, "https://direct.example.org/");
    }

    #[test]
    fn test_max_results() {
        let results = ddg().parse_results(PAGE, 1).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(DuckDuckGo::resolve_link("/settings"), None);
        assert_eq!(
            DuckDuckGo::resolve_link("https://a.com").as_deref(),
            Some("https://a.com")
        );
    }
}
