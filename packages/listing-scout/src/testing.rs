//! Testing utilities including mock implementations.
//!
//! These let the pipeline run end to end without network calls: a scripted
//! language model, a page fetcher serving canned HTML, and a backend factory
//! that wires both into real [`RemoteBackend`]s.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::backends::{AnalysisBackend, BackendFactory, LocalBackend, RemoteBackend};
use crate::error::{BackendError, BackendResult, FetchError, FetchResult};
use crate::sites::SiteSet;
use crate::traits::fetcher::{FetchedPage, PageFetcher};
use crate::traits::model::LanguageModel;
use crate::traits::searcher::WebSearcher;
use crate::types::session::BackendKind;

/// A mock language model.
///
/// Replies are picked by substring match on the user prompt, falling back to
/// a default reply. Queued failures are returned first, one per call.
/// Clones share state, so a test can keep a handle after boxing one.
#[derive(Clone, Default)]
pub struct MockLanguageModel {
    state: Arc<RwLock<ModelState>>,
}

#[derive(Default)]
struct ModelState {
    replies: Vec<(String, String)>,
    default_reply: Option<String>,
    failures: VecDeque<BackendError>,
    persistent_failure: Option<BackendError>,
    stall: Option<Duration>,
    prompts: Vec<String>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` when the user prompt contains `needle`.
    pub fn with_reply(self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.state
            .write()
            .unwrap()
            .replies
            .push((needle.into(), reply.into()));
        self
    }

    pub fn with_default_reply(self, reply: impl Into<String>) -> Self {
        self.state.write().unwrap().default_reply = Some(reply.into());
        self
    }

    /// Fail the next calls with these errors, in order.
    pub fn with_failures(self, failures: Vec<BackendError>) -> Self {
        self.state.write().unwrap().failures.extend(failures);
        self
    }

    /// Fail every call with `error`.
    pub fn failing(self, error: BackendError) -> Self {
        self.state.write().unwrap().persistent_failure = Some(error);
        self
    }

    /// Sleep for `delay` before every answer, to stand in for a provider that
    /// accepts the request and goes quiet.
    pub fn with_stall(self, delay: Duration) -> Self {
        self.state.write().unwrap().stall = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().prompts.len()
    }

    /// User prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.state.read().unwrap().prompts.clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, _system: &str, user: &str) -> BackendResult<String> {
        let stall = {
            let mut state = self.state.write().unwrap();
            state.prompts.push(user.to_string());
            state.stall
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();

        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        if let Some(error) = &state.persistent_failure {
            return Err(error.clone());
        }

        state
            .replies
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| state.default_reply.clone())
            .ok_or_else(|| BackendError::invalid_response("mock model has no reply scripted"))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[derive(Clone)]
enum Scripted {
    Page(FetchedPage),
    Failure(FetchError),
    Stall(Duration),
}

/// A mock page fetcher serving canned pages.
///
/// Unknown URLs are `NotFound`. Clones share state.
#[derive(Clone, Default)]
pub struct MockPageFetcher {
    pages: Arc<RwLock<HashMap<String, Scripted>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        let page = FetchedPage::new(url.clone(), body);
        self.with_response(url, page)
    }

    pub fn with_response(self, url: impl Into<String>, page: FetchedPage) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert(url.into(), Scripted::Page(page));
        self
    }

    pub fn with_failure(self, url: impl Into<String>, error: FetchError) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert(url.into(), Scripted::Failure(error));
        self
    }

    /// Sleep for `delay` before answering `NotFound`; used to trip timeouts.
    pub fn with_stall(self, url: impl Into<String>, delay: Duration) -> Self {
        self.pages
            .write()
            .unwrap()
            .insert(url.into(), Scripted::Stall(delay));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());
        let scripted = self.pages.read().unwrap().get(url).cloned();

        match scripted {
            Some(Scripted::Page(page)) => Ok(page),
            Some(Scripted::Failure(error)) => Err(error),
            Some(Scripted::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Err(FetchError::NotFound {
                    url: url.to_string(),
                    reason: "stalled".to_string(),
                })
            }
            None => Err(FetchError::NotFound {
                url: url.to_string(),
                reason: "no page scripted".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Minimal detail page in the shape the default selectors expect.
pub fn sample_listing_html(
    title: &str,
    price: &str,
    location: &str,
    mileage: &str,
    year: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title} | Marketplace</title></head>
<body>
  <h1>{title}</h1>
  <div data-testid="price">{price}</div>
  <a data-testid="subtitle-sublocation-link" href="/en/ads/{location}">{location}</a>
  <div class="details">
    <div class="label">Mileage:</div><div class="value">{mileage}</div>
    <div class="label">Year of Manufacture:</div><div class="value">{year}</div>
  </div>
</body>
</html>"#
    )
}

/// A backend factory built from mocks.
///
/// Remote kinds are built around the registered [`MockLanguageModel`]; a
/// remote kind with no model is `Unconfigured`. Any kind can be made to fail
/// construction, the local one included.
#[derive(Clone)]
pub struct ScriptedBackendFactory {
    models: HashMap<BackendKind, MockLanguageModel>,
    build_failures: HashMap<BackendKind, BackendError>,
    fetcher: Arc<dyn PageFetcher>,
    searcher: Option<Arc<dyn WebSearcher>>,
    max_candidates: usize,
    builds: Arc<RwLock<Vec<BackendKind>>>,
}

impl ScriptedBackendFactory {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            models: HashMap::new(),
            build_failures: HashMap::new(),
            fetcher,
            searcher: None,
            max_candidates: 5,
            builds: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_model(mut self, kind: BackendKind, model: MockLanguageModel) -> Self {
        self.models.insert(kind, model);
        self
    }

    pub fn with_searcher(mut self, searcher: Arc<dyn WebSearcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn failing_build(mut self, kind: BackendKind, error: BackendError) -> Self {
        self.build_failures.insert(kind, error);
        self
    }

    /// Kinds built so far, in order.
    pub fn builds(&self) -> Vec<BackendKind> {
        self.builds.read().unwrap().clone()
    }
}

#[async_trait]
impl BackendFactory for ScriptedBackendFactory {
    async fn build(&self, kind: BackendKind) -> BackendResult<AnalysisBackend> {
        self.builds.write().unwrap().push(kind);

        if let Some(error) = self.build_failures.get(&kind) {
            return Err(error.clone());
        }

        if kind == BackendKind::LocalDeterministic {
            return Ok(AnalysisBackend::LocalDeterministic(LocalBackend::new(
                self.max_candidates,
            )));
        }

        let model = self
            .models
            .get(&kind)
            .cloned()
            .ok_or_else(|| BackendError::unconfigured(format!("{kind}: no mock model")))?;

        let mut remote = RemoteBackend::new(
            Arc::new(model),
            self.fetcher.clone(),
            SiteSet::default(),
            self.max_candidates,
        );
        if let Some(searcher) = &self.searcher {
            remote = remote.with_searcher(searcher.clone());
        }

        Ok(match kind {
            BackendKind::PrimaryRemote => AnalysisBackend::PrimaryRemote(remote),
            _ => AnalysisBackend::SecondaryRemote(remote),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_scripting() {
        let model = MockLanguageModel::new()
            .with_reply("Aqua", "aqua reply")
            .with_default_reply("default")
            .with_failures(vec![BackendError::connection("reset")]);

        assert!(model.complete("", "Toyota Aqua").await.is_err());
        assert_eq!(model.complete("", "Toyota Aqua").await.unwrap(), "aqua reply");
        assert_eq!(model.complete("", "Honda Fit").await.unwrap(), "default");
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_fetcher_unknown_url() {
        let fetcher = MockPageFetcher::new();
        assert!(matches!(
            fetcher.fetch("https://ikman.lk/en/ad/x-1").await,
            Err(FetchError::NotFound { .. })
        ));
        assert_eq!(fetcher.fetched_urls(), vec!["https://ikman.lk/en/ad/x-1"]);
    }

    #[tokio::test]
    async fn test_scripted_factory_unconfigured_remote() {
        let factory = ScriptedBackendFactory::new(Arc::new(MockPageFetcher::new()));
        assert!(matches!(
            factory.build(BackendKind::PrimaryRemote).await,
            Err(BackendError::Unconfigured { .. })
        ));
        assert!(factory.build(BackendKind::LocalDeterministic).await.is_ok());
        assert_eq!(
            factory.builds(),
            vec![BackendKind::PrimaryRemote, BackendKind::LocalDeterministic]
        );
    }
}
