//! Backend selection and the fallback chain.
//!
//! Selection is speculative: a backend is chosen when its credential looks
//! usable, which says nothing about whether the provider will accept it. The
//! pipeline walks [`BackendSelector::fallback_chain`] when a chosen backend
//! fails, and the chain always ends with the deterministic backend.

use tracing::{debug, warn};

use crate::config::ScoutConfig;
use crate::error::{BackendError, BackendResult};
use crate::security::CredentialIssue;
use crate::types::session::BackendKind;

/// Picks backends from a priority list.
#[derive(Debug, Clone)]
pub struct BackendSelector {
    priority: Vec<BackendKind>,
    force_local: bool,
    issues: Vec<(BackendKind, CredentialIssue)>,
}

impl BackendSelector {
    pub fn new(config: &ScoutConfig) -> Self {
        let issues = config
            .priority
            .iter()
            .filter_map(|kind| {
                let creds = config.credentials_for(*kind)?;
                creds.check().err().map(|issue| (*kind, issue))
            })
            .collect();

        Self {
            priority: config.priority.clone(),
            force_local: config.force_local,
            issues,
        }
    }

    /// Why `kind` cannot be selected, if it cannot.
    pub fn issue_for(&self, kind: BackendKind) -> Option<CredentialIssue> {
        self.issues
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, issue)| *issue)
    }

    /// First candidate in priority order whose credential is well formed.
    pub fn select_backend(&self) -> BackendResult<BackendKind> {
        self.candidates()
            .into_iter()
            .next()
            .ok_or_else(|| {
                BackendError::unconfigured("no backend in the priority list is configured")
            })
    }

    /// Every backend a session may try, in order. Ends with the
    /// deterministic backend even when the priority list omits it.
    pub fn fallback_chain(&self) -> Vec<BackendKind> {
        let mut chain = self.candidates();
        if !chain.contains(&BackendKind::LocalDeterministic) {
            chain.push(BackendKind::LocalDeterministic);
        }
        chain
    }

    fn candidates(&self) -> Vec<BackendKind> {
        if self.force_local {
            debug!("local backend forced by configuration");
            return vec![BackendKind::LocalDeterministic];
        }

        let mut valid = Vec::new();
        for kind in &self.priority {
            match self.issue_for(*kind) {
                Some(issue) => {
                    warn!(backend = %kind, reason = %issue, "skipping backend");
                }
                None => valid.push(*kind),
            }
        }
        valid
    }
}

/// Select a backend directly from configuration.
pub fn select_backend(config: &ScoutConfig) -> BackendResult<BackendKind> {
    BackendSelector::new(config).select_backend()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_OPENAI: &str = "sk-proj-abcdefghijklmnopqrstuvwxyz";
    const GOOD_GEMINI: &str = "AIzaSyA-abcdefghijklmnopqrstuvwxyz";

    #[test]
    fn test_force_local_wins() {
        let config = ScoutConfig::default()
            .with_openai_key(GOOD_OPENAI)
            .with_force_local(true);
        assert_eq!(
            select_backend(&config).unwrap(),
            BackendKind::LocalDeterministic
        );
        assert_eq!(
            BackendSelector::new(&config).fallback_chain(),
            vec![BackendKind::LocalDeterministic]
        );
    }

    #[test]
    fn test_first_valid_candidate() {
        let config = ScoutConfig::default()
            .with_openai_key(GOOD_OPENAI)
            .with_gemini_key(GOOD_GEMINI);
        assert_eq!(select_backend(&config).unwrap(), BackendKind::PrimaryRemote);
        assert_eq!(
            BackendSelector::new(&config).fallback_chain(),
            BackendKind::DEFAULT_PRIORITY.to_vec()
        );
    }

    #[test]
    fn test_malformed_credentials_skipped() {
        let config = ScoutConfig::default()
            .with_openai_key("your_openai_api_key_here")
            .with_gemini_key(GOOD_GEMINI);
        let selector = BackendSelector::new(&config);

        assert_eq!(selector.select_backend().unwrap(), BackendKind::SecondaryRemote);
        assert_eq!(
            selector.issue_for(BackendKind::PrimaryRemote),
            Some(CredentialIssue::Placeholder)
        );
    }

    #[test]
    fn test_nothing_configured_falls_to_local() {
        let config = ScoutConfig::default();
        assert_eq!(
            select_backend(&config).unwrap(),
            BackendKind::LocalDeterministic
        );
    }

    #[test]
    fn test_unconfigured_when_priority_excludes_local() {
        let config = ScoutConfig::default().with_priority(vec![BackendKind::PrimaryRemote]);
        let selector = BackendSelector::new(&config);

        assert!(matches!(
            selector.select_backend(),
            Err(BackendError::Unconfigured { .. })
        ));
        assert_eq!(
            selector.fallback_chain(),
            vec![BackendKind::LocalDeterministic]
        );
    }

    #[test]
    fn test_chain_respects_custom_priority() {
        let config = ScoutConfig::default()
            .with_openai_key(GOOD_OPENAI)
            .with_gemini_key(GOOD_GEMINI)
            .with_priority(vec![BackendKind::SecondaryRemote, BackendKind::PrimaryRemote]);
        assert_eq!(
            BackendSelector::new(&config).fallback_chain(),
            vec![
                BackendKind::SecondaryRemote,
                BackendKind::PrimaryRemote,
                BackendKind::LocalDeterministic
            ]
        );
    }
}
