//! Analysis backends.
//!
//! A session runs against exactly one [`AnalysisBackend`]. The variants
//! expose the same three capabilities and the pipeline dispatches with a
//! `match`, never by name lookup.

pub mod gemini;
pub mod local;
pub mod openai;
pub mod prompts;
pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ScoutConfig;
use crate::error::{BackendError, BackendResult, FetchResult, Result};
use crate::fetchers::{HttpFetcher, RateLimitExt};
use crate::sites::SiteSet;
use crate::traits::fetcher::PageFetcher;
use crate::traits::model::LanguageModel;
use crate::traits::searcher::{SerperWebSearcher, TavilyWebSearcher, WebSearcher};
use crate::types::listing::{ListingCandidate, ListingRecord};
use crate::types::session::BackendKind;

pub use gemini::GeminiModel;
pub use local::LocalBackend;
pub use openai::OpenAiModel;
pub use remote::RemoteBackend;

/// Outbound page fetches per second, shared by every session on a factory.
const FETCH_RATE_PER_SECOND: u32 = 4;

/// The backend bound to one session attempt.
pub enum AnalysisBackend {
    PrimaryRemote(RemoteBackend),
    SecondaryRemote(RemoteBackend),
    LocalDeterministic(LocalBackend),
}

impl AnalysisBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::PrimaryRemote(_) => BackendKind::PrimaryRemote,
            Self::SecondaryRemote(_) => BackendKind::SecondaryRemote,
            Self::LocalDeterministic(_) => BackendKind::LocalDeterministic,
        }
    }

    /// Stage 1.
    pub async fn produce_comparison(
        &self,
        subject_a: &str,
        subject_b: &str,
    ) -> BackendResult<String> {
        match self {
            Self::PrimaryRemote(remote) | Self::SecondaryRemote(remote) => {
                remote.produce_comparison(subject_a, subject_b).await
            }
            Self::LocalDeterministic(local) => Ok(local.produce_comparison(subject_a, subject_b)),
        }
    }

    /// Stage 2, for one subject.
    pub async fn discover_listing_urls(
        &self,
        subject: &str,
    ) -> BackendResult<Vec<ListingCandidate>> {
        match self {
            Self::PrimaryRemote(remote) | Self::SecondaryRemote(remote) => {
                remote.discover_listing_urls(subject).await
            }
            Self::LocalDeterministic(local) => Ok(local.discover_listing_urls(subject)),
        }
    }

    /// Stage 3, for one candidate.
    pub async fn extract_details(
        &self,
        candidate: &ListingCandidate,
        session_id: Uuid,
    ) -> FetchResult<ListingRecord> {
        match self {
            Self::PrimaryRemote(remote) | Self::SecondaryRemote(remote) => {
                remote.extract_details(candidate, session_id).await
            }
            Self::LocalDeterministic(local) => Ok(local.extract_details(candidate, session_id)),
        }
    }

    /// Model name, or "deterministic".
    pub fn describe(&self) -> &str {
        match self {
            Self::PrimaryRemote(remote) | Self::SecondaryRemote(remote) => remote.model_name(),
            Self::LocalDeterministic(_) => "deterministic",
        }
    }
}

/// Builds the backend for a kind once the selector has picked it.
///
/// Construction is where a speculatively selected backend can still turn
/// out unusable; any error here counts as a backend failure.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn build(&self, kind: BackendKind) -> BackendResult<AnalysisBackend>;
}

/// Factory for the real providers, configured from [`ScoutConfig`].
pub struct DefaultBackendFactory {
    config: ScoutConfig,
    fetcher: Arc<dyn PageFetcher>,
    searcher: Option<Arc<dyn WebSearcher>>,
    sites: SiteSet,
}

impl DefaultBackendFactory {
    /// HTTP fetcher (rate limited) plus Serper or Tavily search when keyed.
    pub fn from_config(config: ScoutConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.pipeline.fetch_timeout)?.rate_limited_with_burst(
            FETCH_RATE_PER_SECOND,
            config.pipeline.fetch_concurrency as u32,
        );

        let timeout = config.pipeline.backend_timeout;
        let searcher: Option<Arc<dyn WebSearcher>> =
            match (&config.search.serper_api_key, &config.search.tavily_api_key) {
                (Some(key), _) => {
                    Some(Arc::new(SerperWebSearcher::new(key.clone()).with_timeout(timeout)))
                }
                (None, Some(key)) => {
                    Some(Arc::new(TavilyWebSearcher::new(key.clone()).with_timeout(timeout)))
                }
                (None, None) => None,
            };

        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
            searcher,
            sites: SiteSet::default(),
        })
    }

    /// Override collaborators, for embedding or tests.
    pub fn with_parts(
        config: ScoutConfig,
        fetcher: Arc<dyn PageFetcher>,
        searcher: Option<Arc<dyn WebSearcher>>,
    ) -> Self {
        Self {
            config,
            fetcher,
            searcher,
            sites: SiteSet::default(),
        }
    }

    fn remote(&self, model: Arc<dyn LanguageModel>) -> RemoteBackend {
        let mut remote = RemoteBackend::new(
            model,
            self.fetcher.clone(),
            self.sites.clone(),
            self.config.pipeline.max_candidates,
        )
        .with_retries(self.config.pipeline.max_retries, Duration::from_millis(500));

        if let Some(searcher) = &self.searcher {
            remote = remote.with_searcher(searcher.clone());
        }
        remote
    }
}

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn build(&self, kind: BackendKind) -> BackendResult<AnalysisBackend> {
        if let Some(creds) = self.config.credentials_for(kind) {
            creds
                .check()
                .map_err(|issue| BackendError::unconfigured(format!("{kind}: {issue}")))?;
        }

        let timeout = self.config.pipeline.backend_timeout;
        let backend = match kind {
            BackendKind::PrimaryRemote => {
                let model =
                    OpenAiModel::from_credentials(&self.config.openai)?.with_timeout(timeout);
                AnalysisBackend::PrimaryRemote(self.remote(Arc::new(model)))
            }
            BackendKind::SecondaryRemote => {
                let model =
                    GeminiModel::from_credentials(&self.config.gemini)?.with_timeout(timeout);
                AnalysisBackend::SecondaryRemote(self.remote(Arc::new(model)))
            }
            BackendKind::LocalDeterministic => AnalysisBackend::LocalDeterministic(
                LocalBackend::new(self.config.pipeline.max_candidates),
            ),
        };

        if self.config.verify_backends {
            if let AnalysisBackend::PrimaryRemote(remote)
            | AnalysisBackend::SecondaryRemote(remote) = &backend
            {
                debug!(backend = %kind, "probing backend");
                remote.probe().await?;
            }
        }

        info!(backend = %kind, model = backend.describe(), "backend constructed");
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPageFetcher;

    fn factory(config: ScoutConfig) -> DefaultBackendFactory {
        DefaultBackendFactory::with_parts(config, Arc::new(MockPageFetcher::new()), None)
    }

    #[tokio::test]
    async fn test_local_always_builds() {
        let backend = factory(ScoutConfig::default())
            .build(BackendKind::LocalDeterministic)
            .await
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::LocalDeterministic);
        assert_eq!(backend.describe(), "deterministic");
    }

    #[tokio::test]
    async fn test_remote_without_key_is_unconfigured() {
        let result = factory(ScoutConfig::default())
            .build(BackendKind::PrimaryRemote)
            .await;
        assert!(matches!(result, Err(BackendError::Unconfigured { .. })));
    }

    #[tokio::test]
    async fn test_remote_with_key_builds() {
        let config = ScoutConfig::default().with_gemini_key("AIzaSyA-abcdefghijklmnopqrstuvwxyz");
        let backend = factory(config)
            .build(BackendKind::SecondaryRemote)
            .await
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::SecondaryRemote);
        assert_eq!(backend.describe(), "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_local_dispatch_never_fails() {
        let backend = AnalysisBackend::LocalDeterministic(LocalBackend::new(3));
        assert!(!backend.produce_comparison("a", "b").await.unwrap().is_empty());

        let candidates = backend.discover_listing_urls("Toyota Aqua").await.unwrap();
        assert_eq!(candidates.len(), 3);
        for c in &candidates {
            assert!(backend.extract_details(c, Uuid::new_v4()).await.is_ok());
        }
    }
}
