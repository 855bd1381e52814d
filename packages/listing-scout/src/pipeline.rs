//! Session orchestration.
//!
//! A [`Pipeline`] runs one session through three dependent stages against a
//! single backend:
//!
//! 1. comparison report for the pair
//! 2. candidate discovery, once per subject
//! 3. detail extraction for every candidate, concurrently
//!
//! A backend error in any stage abandons the attempt; the session restarts
//! from stage 1 on the next backend in the fallback chain. Extraction
//! failures never abandon an attempt, they degrade or drop one candidate.
//!
//! # Example
//!
//! ```rust,ignore
//! let pipeline = Pipeline::from_config(ScoutConfig::from_env()?)?;
//! let outcome = pipeline.run("Toyota Aqua", "Honda Fit").await?;
//! println!("{}", outcome.report);
//! ```

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backends::{AnalysisBackend, BackendFactory, DefaultBackendFactory};
use crate::config::{PipelineSettings, ScoutConfig};
use crate::error::{BackendError, BackendResult, FetchError, Result, ScoutError, ValidationError};
use crate::selector::BackendSelector;
use crate::stores::MemoryStore;
use crate::traits::store::{ScoutStore, UpsertOutcome};
use crate::types::listing::{ListingCandidate, ListingRecord};
use crate::types::report::{AnalysisOutcome, BackendTransition, ComparisonReport};
use crate::types::session::{AnalysisSession, BackendKind, SessionState};

pub const MIN_SUBJECT_LEN: usize = 2;
pub const MAX_SUBJECT_LEN: usize = 100;

/// Check a subject name before starting a session.
pub fn validate_subject(subject: &str) -> std::result::Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError {
        subject: subject.to_string(),
        reason: reason.to_string(),
    };

    let len = subject.trim().chars().count();
    if len == 0 {
        return Err(invalid("must not be empty"));
    }
    if len < MIN_SUBJECT_LEN {
        return Err(invalid("must be at least 2 characters"));
    }
    if len > MAX_SUBJECT_LEN {
        return Err(invalid("must be at most 100 characters"));
    }
    Ok(())
}

/// What one successful attempt produced.
struct AttemptOutput {
    backend: BackendKind,
    report: String,
    records: [Vec<ListingRecord>; 2],
}

/// Runs analysis sessions.
pub struct Pipeline {
    factory: Arc<dyn BackendFactory>,
    store: Arc<dyn ScoutStore>,
    chain: Vec<BackendKind>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Fallback chain from the config's selector.
    pub fn new(
        config: &ScoutConfig,
        factory: Arc<dyn BackendFactory>,
        store: Arc<dyn ScoutStore>,
    ) -> Self {
        Self {
            factory,
            store,
            chain: BackendSelector::new(config).fallback_chain(),
            settings: config.pipeline.clone(),
        }
    }

    /// Real providers and an in-memory store.
    pub fn from_config(config: ScoutConfig) -> Result<Self> {
        let store: Arc<dyn ScoutStore> = Arc::new(MemoryStore::new());
        let factory = DefaultBackendFactory::from_config(config.clone())?;
        Ok(Self::new(&config, Arc::new(factory), store))
    }

    /// Replace the fallback chain. The deterministic backend is appended
    /// when missing.
    pub fn with_chain(mut self, mut chain: Vec<BackendKind>) -> Self {
        if !chain.contains(&BackendKind::LocalDeterministic) {
            chain.push(BackendKind::LocalDeterministic);
        }
        self.chain = chain;
        self
    }

    pub fn chain(&self) -> &[BackendKind] {
        &self.chain
    }

    pub fn store(&self) -> &Arc<dyn ScoutStore> {
        &self.store
    }

    pub async fn run(&self, subject_a: &str, subject_b: &str) -> Result<AnalysisOutcome> {
        self.run_with_cancel(subject_a, subject_b, CancellationToken::new())
            .await
    }

    /// Run a session until it completes or `cancel` fires. Records upserted
    /// before cancellation stay in the store.
    pub async fn run_with_cancel(
        &self,
        subject_a: &str,
        subject_b: &str,
        cancel: CancellationToken,
    ) -> Result<AnalysisOutcome> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(subject_a, subject_b, "session cancelled");
                Err(ScoutError::Cancelled)
            }
            result = self.run_session(subject_a, subject_b) => result,
        }
    }

    async fn run_session(&self, subject_a: &str, subject_b: &str) -> Result<AnalysisOutcome> {
        let start = Instant::now();
        let mut session = AnalysisSession::new(subject_a.trim(), subject_b.trim());
        let mut transitions = Vec::new();

        info!(
            session_id = %session.id,
            subject_a = %session.subject_a,
            subject_b = %session.subject_b,
            chain = ?self.chain,
            "session started"
        );

        for (i, kind) in self.chain.iter().copied().enumerate() {
            if i > 0 {
                session = session.restart();
            }

            match self.attempt(&mut session, kind).await {
                Ok(output) => {
                    let [subject_a_records, subject_b_records] = output.records;
                    info!(
                        session_id = %session.id,
                        backend = %output.backend,
                        attempt = session.attempt,
                        subject_a_records = subject_a_records.len(),
                        subject_b_records = subject_b_records.len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "session completed"
                    );
                    return Ok(AnalysisOutcome {
                        session_id: session.id,
                        backend: output.backend,
                        report: output.report,
                        subject_a_records,
                        subject_b_records,
                        transitions,
                    });
                }
                Err(ScoutError::Backend(e)) if kind.is_remote() => {
                    warn!(
                        session_id = %session.id,
                        backend = %kind,
                        error_kind = e.label(),
                        error = %e,
                        "backend failed, restarting session on next backend"
                    );
                    transitions.push(BackendTransition {
                        from: kind,
                        reason: e.to_string(),
                    });
                }
                Err(ScoutError::Backend(e)) => {
                    session.fail();
                    error!(session_id = %session.id, error = %e, "deterministic backend failed");
                    return Err(ScoutError::Fatal {
                        backend: kind,
                        source: e,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        // Only reachable with a chain that lacks the deterministic backend.
        session.fail();
        Err(ScoutError::Fatal {
            backend: BackendKind::LocalDeterministic,
            source: BackendError::unconfigured("fallback chain exhausted"),
        })
    }

    /// Bound one backend call by `backend_timeout`.
    async fn bounded<T>(
        &self,
        call: &str,
        future: impl Future<Output = BackendResult<T>>,
    ) -> BackendResult<T> {
        let limit = self.settings.backend_timeout;
        tokio::time::timeout(limit, future).await.unwrap_or_else(|_| {
            Err(BackendError::connection(format!(
                "{call} timed out after {limit:?}"
            )))
        })
    }

    async fn attempt(
        &self,
        session: &mut AnalysisSession,
        kind: BackendKind,
    ) -> Result<AttemptOutput> {
        let backend = self.bounded("backend setup", self.factory.build(kind)).await?;
        session.bind_backend(backend.kind())?;
        debug!(
            session_id = %session.id,
            attempt = session.attempt,
            backend = %kind,
            model = backend.describe(),
            "backend bound"
        );

        let report = self
            .bounded(
                "comparison",
                backend.produce_comparison(&session.subject_a, &session.subject_b),
            )
            .await?;
        session.advance_to(SessionState::ComparisonDone)?;

        let mut candidates: Vec<(usize, ListingCandidate)> = Vec::new();
        for (idx, subject) in session.subjects().into_iter().enumerate() {
            let found = self
                .bounded("discovery", backend.discover_listing_urls(subject))
                .await?;
            debug!(
                session_id = %session.id,
                subject,
                candidates = found.len(),
                "listings discovered"
            );
            candidates.extend(found.into_iter().map(|c| (idx, c)));
        }
        session.advance_to(SessionState::ListingsDiscovered)?;

        let records = self.extract_all(&backend, &candidates, session.id).await;
        session.advance_to(SessionState::DetailsExtracted)?;

        let saved = ComparisonReport::new(
            session.id,
            session.subject_a.clone(),
            session.subject_b.clone(),
            kind,
            report.clone(),
        );
        if let Err(e) = self.store.save_report(&saved).await {
            warn!(session_id = %session.id, error = %e, "failed to persist comparison report");
        }
        session.advance_to(SessionState::Completed)?;

        Ok(AttemptOutput {
            backend: kind,
            report,
            records,
        })
    }

    /// Stage 3. Fetches complete in any order; output follows discovery order.
    async fn extract_all(
        &self,
        backend: &AnalysisBackend,
        candidates: &[(usize, ListingCandidate)],
        session_id: Uuid,
    ) -> [Vec<ListingRecord>; 2] {
        let concurrency = self.settings.fetch_concurrency.max(1);
        let mut extracted: Vec<(usize, usize, ListingRecord)> =
            stream::iter(candidates.iter().enumerate())
                .map(|(position, (subject_idx, candidate))| async move {
                    let record = self.extract_one(backend, candidate, session_id).await?;
                    self.persist(&record).await;
                    Some((position, *subject_idx, record))
                })
                .buffer_unordered(concurrency)
                .filter_map(|r| async move { r })
                .collect()
                .await;
        extracted.sort_by_key(|(position, _, _)| *position);

        let mut records: [Vec<ListingRecord>; 2] = [Vec::new(), Vec::new()];
        for (_, subject_idx, record) in extracted {
            records[subject_idx].push(record);
        }
        records
    }

    /// One candidate under the per-call fetch timeout. `None` drops it.
    async fn extract_one(
        &self,
        backend: &AnalysisBackend,
        candidate: &ListingCandidate,
        session_id: Uuid,
    ) -> Option<ListingRecord> {
        let limit = self.settings.fetch_timeout;
        let result = tokio::time::timeout(limit, backend.extract_details(candidate, session_id))
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Timeout {
                    url: candidate.url.clone(),
                })
            });

        match result {
            Ok(record) => Some(record),
            Err(e) if e.degrades() => {
                warn!(url = %candidate.url, error = %e, "extraction degraded");
                Some(ListingRecord::degraded(candidate, session_id))
            }
            Err(e) => {
                info!(url = %candidate.url, error = %e, "dropping candidate");
                None
            }
        }
    }

    async fn persist(&self, record: &ListingRecord) {
        if record.is_blank() {
            debug!(link = %record.link, "not persisting blank record");
            return;
        }

        match self.store.upsert_listing(record).await {
            Ok(UpsertOutcome::Inserted) => debug!(link = %record.link, "listing stored"),
            Ok(UpsertOutcome::Refreshed) => {
                debug!(link = %record.link, "listing already known, last-seen session updated")
            }
            Err(e) => warn!(link = %record.link, error = %e, "failed to persist listing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::testing::{MockPageFetcher, ScriptedBackendFactory};

    fn pipeline(factory: ScriptedBackendFactory) -> Pipeline {
        Pipeline::new(
            &ScoutConfig::default().with_force_local(true),
            Arc::new(factory),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn test_validate_subject() {
        assert!(validate_subject("Toyota Aqua").is_ok());
        assert!(validate_subject("   ").is_err());
        assert!(validate_subject("A").is_err());
        assert!(validate_subject(&"x".repeat(101)).is_err());
        assert!(validate_subject(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_with_chain_appends_local() {
        let p = pipeline(ScriptedBackendFactory::new(Arc::new(MockPageFetcher::new())))
            .with_chain(vec![BackendKind::SecondaryRemote]);
        assert_eq!(
            p.chain(),
            &[BackendKind::SecondaryRemote, BackendKind::LocalDeterministic]
        );
    }

    #[tokio::test]
    async fn test_local_session_completes() {
        let factory =
            ScriptedBackendFactory::new(Arc::new(MockPageFetcher::new())).with_max_candidates(3);
        let p = pipeline(factory);

        let outcome = p.run("Toyota Aqua", "Honda Fit").await.unwrap();
        assert_eq!(outcome.backend, BackendKind::LocalDeterministic);
        assert_eq!(outcome.subject_a_records.len(), 3);
        assert_eq!(outcome.subject_b_records.len(), 3);
        assert!(outcome.transitions.is_empty());
        assert_eq!(p.store().count_listings().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_local_build_failure_is_fatal() {
        let factory = ScriptedBackendFactory::new(Arc::new(MockPageFetcher::new()))
            .failing_build(BackendKind::LocalDeterministic, BackendError::connection("boom"));

        let result = pipeline(factory).run("Toyota Aqua", "Honda Fit").await;
        assert!(matches!(
            result,
            Err(ScoutError::Fatal {
                backend: BackendKind::LocalDeterministic,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let factory = ScriptedBackendFactory::new(Arc::new(MockPageFetcher::new()));
        let p = pipeline(factory.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = p.run_with_cancel("Toyota Aqua", "Honda Fit", cancel).await;
        assert!(matches!(result, Err(ScoutError::Cancelled)));
        assert!(factory.builds().is_empty());
    }
}
