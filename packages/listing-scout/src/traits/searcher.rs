//! Web searcher trait for listing discovery.
//!
//! Discovery sends site-scoped queries (`site:ikman.lk Toyota Aqua for sale`)
//! to a search provider and hands the returned URLs to the classifier.
//! A search failure is a backend failure: the backend that owns the searcher
//! is abandoned and the session restarts on the next one.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

use crate::config::DEFAULT_BACKEND_TIMEOUT;
use crate::error::{BackendError, BackendResult};
use crate::fetchers::http::api_client;
use crate::security::SecretString;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// A discovered URL from web search with metadata.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: Url,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

impl SearchResult {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            title: None,
            snippet: None,
        }
    }

    /// Create from a URL string.
    pub fn from_url(url: &str) -> Option<Self> {
        Url::parse(url).ok().map(Self::new)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Web search provider.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Search the web for URLs relevant to the query.
    async fn search(&self, query: &str) -> BackendResult<Vec<SearchResult>>;

    /// Search with a specific result limit.
    async fn search_with_limit(
        &self,
        query: &str,
        limit: usize,
    ) -> BackendResult<Vec<SearchResult>> {
        let mut results = self.search(query).await?;
        results.truncate(limit);
        Ok(results)
    }

    /// Provider name for logs.
    fn name(&self) -> &'static str;
}

/// Mock web searcher for testing.
///
/// A query returns the results of every registered key it contains
/// (case-insensitive), so tests can register by subject and ignore the
/// `site:` prefix discovery adds.
#[derive(Default)]
pub struct MockWebSearcher {
    results: RwLock<HashMap<String, Vec<SearchResult>>>,
    failure: Option<BackendError>,
    queries: RwLock<Vec<String>>,
}

impl MockWebSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(self, key: &str, results: Vec<SearchResult>) -> Self {
        if let Ok(mut map) = self.results.write() {
            map.entry(key.to_lowercase()).or_default().extend(results);
        }
        self
    }

    /// Add URL strings as results.
    pub fn with_urls(self, key: &str, urls: &[&str]) -> Self {
        let results: Vec<_> = urls
            .iter()
            .filter_map(|u| SearchResult::from_url(u))
            .collect();
        self.with_results(key, results)
    }

    /// Fail every search with `error`.
    pub fn failing(mut self, error: BackendError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.read().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WebSearcher for MockWebSearcher {
    async fn search(&self, query: &str) -> BackendResult<Vec<SearchResult>> {
        if let Ok(mut queries) = self.queries.write() {
            queries.push(query.to_string());
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let lowered = query.to_lowercase();
        let map = self
            .results
            .read()
            .map_err(|_| BackendError::connection("mock searcher lock poisoned"))?;

        let mut keys: Vec<_> = map.keys().filter(|k| lowered.contains(k.as_str())).collect();
        keys.sort();
        Ok(keys
            .into_iter()
            .flat_map(|k| map[k].iter().cloned())
            .collect())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Serper (Google results) web searcher.
pub struct SerperWebSearcher {
    api_key: SecretString,
    client: reqwest::Client,
    pub default_limit: usize,
}

impl SerperWebSearcher {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            client: api_client(DEFAULT_BACKEND_TIMEOUT),
            default_limit: 10,
        }
    }

    /// Per-request timeout (default 60s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = api_client(timeout);
        self
    }
}

#[async_trait]
impl WebSearcher for SerperWebSearcher {
    async fn search(&self, query: &str) -> BackendResult<Vec<SearchResult>> {
        self.search_with_limit(query, self.default_limit).await
    }

    async fn search_with_limit(
        &self,
        query: &str,
        limit: usize,
    ) -> BackendResult<Vec<SearchResult>> {
        #[derive(serde::Serialize)]
        struct Request<'a> {
            q: &'a str,
            num: usize,
        }

        #[derive(serde::Deserialize)]
        struct Response {
            #[serde(default)]
            organic: Vec<Organic>,
        }

        #[derive(serde::Deserialize)]
        struct Organic {
            link: String,
            title: Option<String>,
            snippet: Option<String>,
        }

        let response = self
            .client
            .post(SERPER_ENDPOINT)
            .header("X-API-KEY", self.api_key.expose())
            .json(&Request { q: query, num: limit })
            .send()
            .await
            .map_err(|e| BackendError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(format!("serper: {e}")))?;

        Ok(body
            .organic
            .into_iter()
            .filter_map(|r| {
                let mut result = SearchResult::from_url(&r.link)?;
                if let Some(title) = r.title {
                    result = result.with_title(title);
                }
                if let Some(snippet) = r.snippet {
                    result = result.with_snippet(snippet);
                }
                Some(result)
            })
            .take(limit)
            .collect())
    }

    fn name(&self) -> &'static str {
        "serper"
    }
}

/// Tavily-backed web searcher.
pub struct TavilyWebSearcher {
    api_key: SecretString,
    client: reqwest::Client,
    pub default_limit: usize,
}

impl TavilyWebSearcher {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            client: api_client(DEFAULT_BACKEND_TIMEOUT),
            default_limit: 10,
        }
    }

    /// Per-request timeout (default 60s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = api_client(timeout);
        self
    }
}

#[async_trait]
impl WebSearcher for TavilyWebSearcher {
    async fn search(&self, query: &str) -> BackendResult<Vec<SearchResult>> {
        self.search_with_limit(query, self.default_limit).await
    }

    async fn search_with_limit(
        &self,
        query: &str,
        limit: usize,
    ) -> BackendResult<Vec<SearchResult>> {
        #[derive(serde::Serialize)]
        struct Request<'a> {
            query: &'a str,
            search_depth: &'a str,
            max_results: usize,
        }

        #[derive(serde::Deserialize)]
        struct Response {
            #[serde(default)]
            results: Vec<TavilyResult>,
        }

        #[derive(serde::Deserialize)]
        struct TavilyResult {
            url: String,
            title: Option<String>,
            content: Option<String>,
        }

        let response = self
            .client
            .post(TAVILY_ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&Request {
                query,
                search_depth: "basic",
                max_results: limit,
            })
            .send()
            .await
            .map_err(|e| BackendError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body));
        }

        let body: Response = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(format!("tavily: {e}")))?;

        Ok(body
            .results
            .into_iter()
            .filter_map(|r| {
                let mut result = SearchResult::from_url(&r.url)?;
                if let Some(title) = r.title {
                    result = result.with_title(title);
                }
                if let Some(content) = r.content {
                    result = result.with_snippet(content);
                }
                Some(result)
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_matches_by_contained_key() {
        let searcher = MockWebSearcher::new().with_urls(
            "Toyota Aqua",
            &[
                "https://ikman.lk/en/ad/toyota-aqua-2015-for-sale-colombo-1",
                "https://ikman.lk/en/ad/toyota-aqua-2016-for-sale-kandy-2",
            ],
        );

        let results = searcher
            .search("site:ikman.lk toyota aqua for sale")
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(searcher.search("honda fit").await.unwrap().is_empty());
        assert_eq!(searcher.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_search_with_limit() {
        let searcher = MockWebSearcher::new().with_urls(
            "query",
            &["https://a.com", "https://b.com", "https://c.com"],
        );

        let results = searcher.search_with_limit("query", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let searcher =
            MockWebSearcher::new().failing(BackendError::RateLimited { message: "slow".into() });
        assert!(matches!(
            searcher.search("anything").await,
            Err(BackendError::RateLimited { .. })
        ));
    }
}
