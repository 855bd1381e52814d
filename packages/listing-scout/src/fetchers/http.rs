//! Plain HTTP page fetcher.
//!
//! Marketplace pages render their ad fields server-side, so a browser-like
//! `reqwest` client is enough. No JavaScript rendering.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult, Result, ScoutError};
use crate::traits::fetcher::{FetchedPage, PageFetcher};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches pages over HTTP with browser-like headers.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher whose transport gives up after `timeout`.
    ///
    /// The pipeline applies its own per-call budget on top; this one only
    /// stops sockets from lingering after the pipeline has moved on.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ScoutError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        debug!(url = %url, "HTTP fetch starting");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            transport_error(url, &e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::NotFound {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(url, &e))?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// JSON API client whose requests give up after `timeout`.
///
/// A provider that accepts the connection and never answers then surfaces as
/// a transport error, which classifies as a connection failure.
pub fn api_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to build API client, falling back to defaults");
            reqwest::Client::new()
        })
}

fn transport_error(url: &str, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_decode() || err.is_body() {
        FetchError::ParseFailure {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        FetchError::NotFound {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
