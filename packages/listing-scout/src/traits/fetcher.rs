//! Page fetcher trait.
//!
//! Fetchers return raw HTML for one URL. They do not retry and do not apply
//! the per-call timeout; the pipeline owns both budgets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FetchResult;

/// A fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Requested URL.
    pub url: String,

    /// URL after redirects.
    pub final_url: String,

    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_final_url(mut self, url: impl Into<String>) -> Self {
        self.final_url = url.into();
        self
    }

    /// Whether the body can be parsed as HTML. A missing content type is
    /// given the benefit of the doubt.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_lowercase();
                ct.contains("html") || ct.contains("xml")
            }
            None => true,
        }
    }
}

/// Fetches listing pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page.
    ///
    /// Errors: `NotFound` when nothing usable came back (HTTP error status,
    /// DNS failure, refused connection), `Timeout` when the transport gave up.
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage>;

    /// Fetcher name for logs.
    fn name(&self) -> &str;
}
