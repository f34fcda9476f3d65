//! Bing web search (HTML scraping)

use super::traits::*;
use crate::config::ProviderSettings;
use crate::network::{HttpClient, HttpRequest};
use crate::results::SearchResult;
use anyhow::Result;
use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.bing.com/search";

pub struct Bing {
    name: String,
    client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl Bing {
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

    fn parse_results(&self, html: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);
        let result_selector = selector("li.b_algo")?;
        let title_selector = selector("h2")?;
        let link_selector = selector("a")?;
        let snippet_selector = selector("p")?;

        let mut results = Vec::new();
        for element in document.select(&result_selector).take(max_results) {
            let Some(title_elem) = element.select(&title_selector).next() else {
                continue;
            };
            let Some(link_elem) = title_elem.select(&link_selector).next() else {
                continue;
            };

            let title = clean_text(title_elem.text());
            let url = link_elem.value().attr("href").unwrap_or_default();
            if title.is_empty() || !url.starts_with("http") {
                continue;
            }

            let snippet = element
                .select(&snippet_selector)
                .next()
                .map(|p| clean_text(p.text()))
                .unwrap_or_default();

            results.push(SearchResult::new(title, url, snippet, "bing"));
        }

        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for Bing {
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
            .param("count", max_results)
            .timeout(self.timeout);

        if !options.region.is_empty() {
            request = request.param("cc", &options.region);
            if !options.language.is_empty() {
                request = request.param(
                    "setlang",
                    format!("{}-{}", options.language, options.region),
                );
            }
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
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <ol id="b_results">
          <li class="b_algo">
            <h2><a href="https://first.example.com/">First   result</a></h2>
            <p>First snippet</p>
          </li>
          <li class="b_algo">
            <h2><a href="/internal">Internal</a></h2>
          </li>
          <li class="b_algo">
            <h2><a href="https://second.example.com/">Second</a></h2>
          </li>
        </ol>
    "#;

    fn bing(base_url: Option<String>) -> Bing {
        let settings = ProviderSettings {
            name: "bing".to_string(),
            base_url,
            ..Default::default()
        };
        Bing::new(&settings, HttpClient::new().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_results() {
        let results = bing(None).parse_results(PAGE, 10).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "First result");
        assert_eq!(results[0].snippet, "First snippet");
        assert_eq!(results[1].url, "https://second.example.com/");
        assert_eq!(results[1].snippet, "");
    }

    #[tokio::test]
    async fn test_search_sends_locale() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("cc", "br"))
            .and(query_param("setlang", "pt-br"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let options = SearchOptions {
            language: "pt".to_string(),
            region: "br".to_string(),
            ..Default::default()
        };
        let results = bing(Some(server.uri()))
            .search("mercado", 1, &options)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }
}
