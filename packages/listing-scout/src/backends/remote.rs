//! Remote model backend.
//!
//! Both remote kinds share this implementation and differ only in the
//! `LanguageModel` they drive. Listing discovery goes through a web search
//! provider when one is configured; otherwise the model itself is asked for
//! candidate URLs, which are then held to the same classifier.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::prompts;
use crate::discovery::{candidates_from_urls, extract_urls, ListingDiscoverer};
use crate::error::{BackendError, BackendResult, FetchResult};
use crate::extract::DetailExtractor;
use crate::report::clean_report;
use crate::sites::SiteSet;
use crate::traits::fetcher::PageFetcher;
use crate::traits::model::LanguageModel;
use crate::traits::searcher::WebSearcher;
use crate::types::listing::{ListingCandidate, ListingRecord};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// A backend driven by a remote language model.
pub struct RemoteBackend {
    model: Arc<dyn LanguageModel>,
    discoverer: Option<ListingDiscoverer>,
    extractor: DetailExtractor,
    sites: SiteSet,
    max_candidates: usize,
    max_retries: u32,
    retry_delay: Duration,
}

impl RemoteBackend {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        fetcher: Arc<dyn PageFetcher>,
        sites: SiteSet,
        max_candidates: usize,
    ) -> Self {
        Self {
            model,
            discoverer: None,
            extractor: DetailExtractor::new(fetcher, sites.clone()),
            sites,
            max_candidates,
            max_retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Discover listings through `searcher` instead of asking the model.
    pub fn with_searcher(mut self, searcher: Arc<dyn WebSearcher>) -> Self {
        self.discoverer = Some(ListingDiscoverer::new(
            searcher,
            self.sites.clone(),
            self.max_candidates,
        ));
        self
    }

    /// Retry transient model errors up to `max_retries` times, doubling
    /// `delay` each attempt.
    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub async fn produce_comparison(
        &self,
        subject_a: &str,
        subject_b: &str,
    ) -> BackendResult<String> {
        let user = prompts::comparison_prompt(subject_a, subject_b);
        let raw = self
            .with_retry(|| self.model.complete(prompts::COMPARISON_SYSTEM, &user))
            .await?;

        let report = clean_report(&raw);
        if report.is_empty() {
            return Err(BackendError::invalid_response("comparison report was empty"));
        }
        Ok(report)
    }

    pub async fn discover_listing_urls(
        &self,
        subject: &str,
    ) -> BackendResult<Vec<ListingCandidate>> {
        if let Some(discoverer) = &self.discoverer {
            return discoverer.discover(subject).await;
        }

        let user = prompts::url_finder_prompt(subject, &self.sites.domains(), self.max_candidates);
        let reply = self
            .with_retry(|| self.model.complete(prompts::URL_FINDER_SYSTEM, &user))
            .await?;

        let urls = extract_urls(&reply);
        let candidates = candidates_from_urls(&urls, subject, &self.sites, self.max_candidates);
        debug!(
            subject = %subject,
            proposed = urls.len(),
            accepted = candidates.len(),
            "model proposed listing URLs"
        );
        Ok(candidates)
    }

    pub async fn extract_details(
        &self,
        candidate: &ListingCandidate,
        session_id: Uuid,
    ) -> FetchResult<ListingRecord> {
        self.extractor.extract(candidate, session_id).await
    }

    /// Cheap request proving the credential works.
    pub async fn probe(&self) -> BackendResult<()> {
        self.model.probe().await
    }

    async fn with_retry<F, Fut>(&self, call: F) -> BackendResult<String>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BackendResult<String>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self
                        .retry_delay
                        .saturating_mul(2u32.saturating_pow(attempt))
                        .min(MAX_RETRY_DELAY);
                    warn!(
                        model = self.model.model_name(),
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient model error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockLanguageModel, MockPageFetcher};
    use crate::traits::searcher::MockWebSearcher;

    fn backend(model: MockLanguageModel) -> RemoteBackend {
        RemoteBackend::new(
            Arc::new(model),
            Arc::new(MockPageFetcher::new()),
            SiteSet::default(),
            5,
        )
    }

    #[tokio::test]
    async fn test_comparison_is_cleaned() {
        let model = MockLanguageModel::new().with_default_reply("```\n# Report\n\n\n\nBody\n```");
        let report = backend(model).produce_comparison("A", "B").await.unwrap();
        assert_eq!(report, "# Report\n\nBody");
    }

    #[tokio::test]
    async fn test_blank_comparison_is_invalid_response() {
        let model = MockLanguageModel::new().with_default_reply("```\n```");
        assert!(matches!(
            backend(model).produce_comparison("A", "B").await,
            Err(BackendError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_model_urls_are_classified() {
        let model = MockLanguageModel::new().with_default_reply(
            "- https://ikman.lk/en/ad/honda-fit-2014-for-sale-colombo-1\n\
             - https://ikman.lk/en/ads/sri-lanka/cars/honda/fit\n\
             - https://example.com/honda-fit-2",
        );
        let candidates = backend(model).discover_listing_urls("Honda Fit").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].site, "ikman.lk");
    }

    #[tokio::test]
    async fn test_searcher_preferred_over_model() {
        let model = MockLanguageModel::new();
        let searcher = MockWebSearcher::new()
            .with_urls("honda fit", &["https://ikman.lk/en/ad/honda-fit-2014-for-sale-colombo-1"]);
        let remote = backend(model.clone()).with_searcher(Arc::new(searcher));

        let candidates = remote.discover_listing_urls("Honda Fit").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_errors_retried() {
        let model = MockLanguageModel::new()
            .with_failures(vec![BackendError::connection("reset")])
            .with_default_reply("# Report");
        let remote = backend(model.clone()).with_retries(1, Duration::from_millis(1));

        assert_eq!(remote.produce_comparison("A", "B").await.unwrap(), "# Report");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let model = MockLanguageModel::new()
            .with_failures(vec![BackendError::connection("reset")])
            .with_default_reply("# Report");
        let remote = backend(model.clone());

        assert!(remote.produce_comparison("A", "B").await.is_err());
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_auth_errors_not_retried() {
        let model = MockLanguageModel::new()
            .with_failures(vec![BackendError::AuthInvalid { message: "bad key".into() }])
            .with_default_reply("# Report");
        let remote = backend(model.clone()).with_retries(3, Duration::from_millis(1));

        assert!(matches!(
            remote.produce_comparison("A", "B").await,
            Err(BackendError::AuthInvalid { .. })
        ));
        assert_eq!(model.call_count(), 1);
    }
}
